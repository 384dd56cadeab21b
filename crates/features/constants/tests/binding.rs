use fhub_constants::{CONSTANTS, ConstantsFeature, NAME};
use fhub_kernel::prelude::*;
use serde_json::json;
use std::sync::Arc;

#[derive(Default)]
struct Mailer {
    sender: Option<String>,
}

#[async_trait]
impl Feature for Mailer {
    fn name(&self) -> &str {
        "mailer"
    }

    fn init(&mut self, ctx: &mut FeatureContext<'_>) -> Result<(), FeatureError> {
        let constants = ctx.lookup(CONSTANTS)?;
        self.sender = constants.get("support_email")?;
        Ok(())
    }
}

#[test]
fn later_feature_reads_published_constants() {
    let document = ConfigDocument::new()
        .with_section(NAME, json!({ "values": { "support_email": "ops@example.com" } }));

    let registry = Registry::builder()
        .feature(ConstantsFeature::new())
        .feature(Mailer::default())
        .config(document)
        .build()
        .expect("registry builds");

    let mailer = registry.feature::<Mailer>("mailer").expect("mailer registered");
    assert_eq!(mailer.sender.as_deref(), Some("ops@example.com"));

    let published = registry.bindings().get(CONSTANTS).expect("constants published");
    let owned = registry.feature::<ConstantsFeature>(NAME).and_then(ConstantsFeature::constants);
    assert!(owned.is_some_and(|table| Arc::ptr_eq(&table, &published)));
    assert_eq!(registry.bindings().owner("constants"), Some(NAME));
}

#[test]
fn absent_section_publishes_empty_table() {
    let registry =
        Registry::build(vec![Box::new(ConstantsFeature::new())], &ConfigDocument::new()).expect("registry builds");

    let published = registry.bindings().get(CONSTANTS).expect("constants published");
    assert!(published.is_empty());
}

#[test]
fn unknown_keys_fail_validation() {
    let document = ConfigDocument::new().with_section(NAME, json!({ "constants_store": {} }));

    let err = Registry::build(vec![Box::new(ConstantsFeature::new())], &document).expect_err("unknown key");

    assert!(matches!(err, RegistryError::ConfigValidation { source: FeatureError::Deserialize { .. }, .. }));
}

#[test]
fn consumer_registered_first_cannot_see_constants() {
    let err = Registry::builder()
        .feature(Mailer::default())
        .feature(ConstantsFeature::new())
        .build()
        .expect_err("constants are published later");

    assert!(matches!(
        err,
        RegistryError::Init { ref feature, source: FeatureError::BindingNotFound { .. }, .. } if feature == "mailer"
    ));
}
