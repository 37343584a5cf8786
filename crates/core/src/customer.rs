//! Customer contact details submitted with an order.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::types::Email;

/// Contact and delivery details for an order.
///
/// Deserialized straight from the checkout form's `customerDetails` field;
/// call [`CustomerDetails::validate`] before using it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerDetails {
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternate_phone: Option<String>,
    pub address: String,
    #[serde(default)]
    pub landmark: String,
    pub pincode: String,
}

/// One field that failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldProblem {
    pub field: &'static str,
    pub message: &'static str,
}

/// Every problem found in a set of customer details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerError {
    pub problems: Vec<FieldProblem>,
}

impl fmt::Display for CustomerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Invalid customer details: ")?;
        for (i, p) in self.problems.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            f.write_str(p.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for CustomerError {}

impl CustomerError {
    /// Whether `field` is among the failures.
    #[must_use]
    pub fn has(&self, field: &str) -> bool {
        self.problems.iter().any(|p| p.field == field)
    }
}

const MAX_NAME_LEN: usize = 100;
const MAX_ADDRESS_LEN: usize = 500;

impl CustomerDetails {
    /// Validate and normalize the details.
    ///
    /// Text fields are trimmed, phone numbers reduced to their 10 digits,
    /// and an empty alternate phone becomes `None`.
    ///
    /// # Errors
    ///
    /// Returns a [`CustomerError`] listing every field that is invalid.
    pub fn validate(self) -> Result<Self, CustomerError> {
        let mut problems = Vec::new();
        let mut fail = |field: &'static str, message: &'static str| {
            problems.push(FieldProblem { field, message });
        };

        let name = self.name.trim().to_string();
        if name.is_empty() {
            fail("name", "Name is required");
        } else if name.chars().count() > MAX_NAME_LEN {
            fail("name", "Name is too long");
        }

        let email = match Email::parse(&self.email) {
            Ok(email) => email.into_inner(),
            Err(_) => {
                fail("email", "Enter a valid email address");
                String::new()
            }
        };

        let phone = normalize_phone(&self.phone).unwrap_or_else(|| {
            fail("phone", "Enter a valid 10-digit mobile number");
            String::new()
        });

        let alternate_phone = match self.alternate_phone.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => normalize_phone(raw).or_else(|| {
                fail("alternatePhone", "Enter a valid alternate mobile number");
                None
            }),
        };

        let address = self.address.trim().to_string();
        if address.is_empty() {
            fail("address", "Address is required");
        } else if address.chars().count() > MAX_ADDRESS_LEN {
            fail("address", "Address is too long");
        }

        let landmark = self.landmark.trim().to_string();
        if landmark.is_empty() {
            fail("landmark", "Landmark is required");
        } else if landmark.chars().count() > MAX_NAME_LEN {
            fail("landmark", "Landmark is too long");
        }

        let pincode = self.pincode.trim().to_string();
        if !is_valid_pincode(&pincode) {
            fail("pincode", "Enter a valid 6-digit PIN code");
        }

        if !problems.is_empty() {
            return Err(CustomerError { problems });
        }

        Ok(Self {
            name,
            email,
            phone,
            alternate_phone,
            address,
            landmark,
            pincode,
        })
    }

    /// Single-line delivery address for emails and order listings.
    #[must_use]
    pub fn full_address(&self) -> String {
        format!(
            "{}, near {}, PIN {}",
            self.address, self.landmark, self.pincode
        )
    }
}

/// Reduce an Indian mobile number to its 10 digits.
///
/// Accepts `9876543210`, `+91 98765 43210`, `91-9876543210` and similar.
/// The number must start with 6, 7, 8 or 9.
#[must_use]
pub fn normalize_phone(raw: &str) -> Option<String> {
    let digits: String = raw
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '+' | '(' | ')'))
        .collect();
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let local = match digits.len() {
        10 => digits.as_str(),
        12 => digits.strip_prefix("91")?,
        _ => return None,
    };
    local
        .starts_with(['6', '7', '8', '9'])
        .then(|| local.to_string())
}

/// Six digits, not starting with zero.
#[must_use]
pub fn is_valid_pincode(pincode: &str) -> bool {
    pincode.len() == 6
        && pincode.chars().all(|c| c.is_ascii_digit())
        && !pincode.starts_with('0')
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn details() -> CustomerDetails {
        CustomerDetails {
            name: " Asha Rao ".into(),
            email: "asha@example.in".into(),
            phone: "+91 98765 43210".into(),
            alternate_phone: Some(String::new()),
            address: "12 MG Road, Bengaluru".into(),
            landmark: " Opposite Cubbon Park ".into(),
            pincode: "560001".into(),
        }
    }

    #[test]
    fn test_valid_details_are_normalized() {
        let d = details().validate().unwrap();
        assert_eq!(d.name, "Asha Rao");
        assert_eq!(d.phone, "9876543210");
        assert_eq!(d.alternate_phone, None);
        assert_eq!(d.landmark, "Opposite Cubbon Park");
        assert_eq!(
            d.full_address(),
            "12 MG Road, Bengaluru, near Opposite Cubbon Park, PIN 560001"
        );
    }

    #[test]
    fn test_collects_every_problem() {
        let err = CustomerDetails {
            name: String::new(),
            email: "nope".into(),
            phone: "12345".into(),
            alternate_phone: Some("5555555555".into()),
            address: " ".into(),
            landmark: String::new(),
            pincode: "012345".into(),
        }
        .validate()
        .unwrap_err();
        for field in [
            "name",
            "email",
            "phone",
            "alternatePhone",
            "address",
            "landmark",
            "pincode",
        ] {
            assert!(err.has(field), "{field}");
        }
        assert!(err.to_string().starts_with("Invalid customer details: Name is required"));
    }

    #[test]
    fn test_landmark_is_required() {
        let blank = CustomerDetails {
            landmark: "   ".into(),
            ..details()
        };
        let err = blank.validate().unwrap_err();
        assert_eq!(
            err.problems,
            vec![FieldProblem {
                field: "landmark",
                message: "Landmark is required",
            }]
        );

        let json = r#"{"name":"A","email":"a@b.co","phone":"9876543210",
            "address":"x","pincode":"400001"}"#;
        let missing: CustomerDetails = serde_json::from_str(json).unwrap();
        assert!(missing.validate().unwrap_err().has("landmark"));
    }

    #[test]
    fn test_phone_rules() {
        assert_eq!(normalize_phone("9876543210").as_deref(), Some("9876543210"));
        assert_eq!(normalize_phone("919876543210").as_deref(), Some("9876543210"));
        assert_eq!(normalize_phone("91-6000000000").as_deref(), Some("6000000000"));
        assert_eq!(normalize_phone("5876543210"), None);
        assert_eq!(normalize_phone("929876543210"), None);
        assert_eq!(normalize_phone("98765x3210"), None);
    }

    #[test]
    fn test_pincode_rules() {
        assert!(is_valid_pincode("110001"));
        assert!(!is_valid_pincode("011001"));
        assert!(!is_valid_pincode("11001"));
        assert!(!is_valid_pincode("1100011"));
    }

    #[test]
    fn test_deserializes_form_field() {
        let json = r#"{"name":"A","email":"a@b.co","phone":"9876543210",
            "alternatePhone":"","address":"x","landmark":"Temple","pincode":"400001"}"#;
        let d: CustomerDetails = serde_json::from_str(json).unwrap();
        assert_eq!(d.landmark, "Temple");
    }
}
