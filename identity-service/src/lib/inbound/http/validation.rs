use std::collections::BTreeMap;
use std::str::FromStr;

/// Field name to human readable reason, one entry per failing field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(BTreeMap<String, String>);

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn into_map(self) -> BTreeMap<String, String> {
        self.0
    }
}

/// Declarative field constraints for a decoded request body.
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationErrors>;
}

/// Collects rule failures across the fields of one request body.
///
/// Rules on a field run in the order they are chained and stop at the first
/// failure, so each field reports at most one reason.
#[derive(Debug, Default)]
pub struct Validator {
    errors: BTreeMap<String, String>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start checking one field.
    ///
    /// # Arguments
    /// * `name` - Field name as it appears on the wire
    /// * `value` - Decoded field value
    pub fn field<'a>(&'a mut self, name: &'a str, value: &'a str) -> FieldRules<'a> {
        FieldRules {
            validator: self,
            name,
            value,
        }
    }

    pub fn finish(self) -> Result<(), ValidationErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors(self.errors))
        }
    }
}

/// Rule chain for a single field.
pub struct FieldRules<'a> {
    validator: &'a mut Validator,
    name: &'a str,
    value: &'a str,
}

impl<'a> FieldRules<'a> {
    pub fn required(self) -> Self {
        let name = self.name;
        let failed = self.value.is_empty();
        self.check(failed, || format!("{} is required", name))
    }

    pub fn email(self) -> Self {
        let name = self.name;
        let failed = email_address::EmailAddress::from_str(self.value).is_err();
        self.check(failed, || format!("{} must be a valid email address", name))
    }

    /// Require this field to equal another field of the same body.
    pub fn eq_field(self, other_name: &str, other_value: &str) -> Self {
        let name = self.name;
        let failed = self.value != other_value;
        self.check(failed, || format!("{} should match {}", name, other_name))
    }

    fn check(self, failed: bool, message: impl FnOnce() -> String) -> Self {
        if failed && !self.validator.errors.contains_key(self.name) {
            let message = message();
            self.validator.errors.insert(self.name.to_string(), message);
        }
        self
    }
}
