//! Convenience macros for plugin development.

/// Builds the `Vec<OperationDescriptor>` returned by
/// [`Plugin::supported_operations`](crate::plugin::Plugin::supported_operations).
///
/// Each entry is `resource_type => Operation`, where `resource_type` is a
/// string literal or `*` for any type and `Operation` names an
/// [`OperationKind`](crate::descriptor::OperationKind) variant. Extended
/// operations take their name in parentheses. `operations![all]` matches
/// everything.
///
/// # Example
/// ```rust,ignore
/// fn supported_operations(&self) -> Vec<OperationDescriptor> {
///     operations![
///         "Patient" => Read,
///         "Patient" => Update,
///         * => Delete,
///         "Patient" => Extended("$everything"),
///     ]
/// }
/// ```
#[macro_export]
macro_rules! operations {
    (@kind $op:ident ($name:expr)) => {
        $crate::descriptor::OperationKind::$op(::std::string::String::from($name))
    };
    (@kind $op:ident) => {
        $crate::descriptor::OperationKind::$op
    };
    (@one * => $op:ident $(($name:expr))?) => {
        $crate::descriptor::OperationDescriptor::any_type(
            $crate::operations!(@kind $op $(($name))?),
        )
    };
    (@one $rt:literal => $op:ident $(($name:expr))?) => {
        $crate::descriptor::OperationDescriptor::new(
            $rt,
            $crate::operations!(@kind $op $(($name))?),
        )
    };
    (all) => {
        vec![$crate::descriptor::OperationDescriptor::All]
    };
    ($($rt:tt => $op:ident $(($name:expr))?),* $(,)?) => {
        vec![$($crate::operations!(@one $rt => $op $(($name))?)),*]
    };
}

#[cfg(test)]
mod tests {
    use crate::descriptor::{OperationDescriptor, OperationKind};

    #[test]
    fn test_operations_macro() {
        let ops = operations![
            "Patient" => Read,
            * => Delete,
            "Patient" => Extended("$everything"),
        ];

        assert_eq!(
            ops,
            vec![
                OperationDescriptor::new("Patient", OperationKind::Read),
                OperationDescriptor::any_type(OperationKind::Delete),
                OperationDescriptor::new("Patient", OperationKind::Extended("$everything".into())),
            ]
        );
        assert_eq!(operations![all], vec![OperationDescriptor::All]);
    }
}
