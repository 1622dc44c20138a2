//! The default extension set.

use std::any::TypeId;
use std::collections::HashSet;

use cuneus_ext::{ExceptionExtension, HealthExtension, LoggingExtension};

use super::input::ExtensionInput;

/// Logging, health and exception handling, in that order.
///
/// Logging comes first so every later startup is observable.
pub fn default_extensions() -> Vec<ExtensionInput> {
    vec![
        ExtensionInput::of_type::<LoggingExtension>(),
        ExtensionInput::of_type::<HealthExtension>(),
        ExtensionInput::of_type::<ExceptionExtension>(),
    ]
}

/// The final input list: defaults first, then the user's inputs.
///
/// A default whose type the user supplied is dropped, so the user's
/// instance keeps its own position.
pub fn with_defaults(user: Vec<ExtensionInput>, include_defaults: bool) -> Vec<ExtensionInput> {
    if !include_defaults {
        return user;
    }

    let supplied: HashSet<TypeId> = user.iter().map(ExtensionInput::type_id).collect();
    default_extensions()
        .into_iter()
        .filter(|input| !supplied.contains(&input.type_id()))
        .chain(user)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cuneus_core::traits::{Extension, ExtensionContext};
    use cuneus_core::Settings;

    struct Billing;

    #[async_trait]
    impl Extension for Billing {}

    fn names(inputs: &[ExtensionInput]) -> Vec<&str> {
        inputs
            .iter()
            .map(|input| cuneus_core::traits::short_type_name(input.type_name()))
            .collect()
    }

    #[test]
    fn test_defaults_are_prepended() {
        let inputs = with_defaults(vec![ExtensionInput::instance(Billing)], true);
        assert_eq!(
            names(&inputs),
            vec!["LoggingExtension", "HealthExtension", "ExceptionExtension", "Billing"]
        );
    }

    #[test]
    fn test_user_default_keeps_its_position() {
        let custom_health = HealthExtension::new(&ExtensionContext::from_settings(Settings {
            health_prefix: "/status".to_string(),
            ..Settings::default()
        }));
        let inputs = with_defaults(
            vec![
                ExtensionInput::instance(Billing),
                ExtensionInput::instance(custom_health),
            ],
            true,
        );
        assert_eq!(
            names(&inputs),
            vec!["LoggingExtension", "ExceptionExtension", "Billing", "HealthExtension"]
        );
    }

    #[test]
    fn test_defaults_can_be_suppressed() {
        let inputs = with_defaults(vec![ExtensionInput::instance(Billing)], false);
        assert_eq!(names(&inputs), vec!["Billing"]);
        assert!(with_defaults(Vec::new(), false).is_empty());
    }
}
