//! Grant identity and its external ID encoding.
//!
//! The external ID is the only thing the host keeps between calls, so the
//! format is fixed: five `|`-separated fields
//!
//! ```text
//! resource_name|schema_name|object_name|privilege|grant_option
//! ```
//!
//! `grant_option` is `true` or `false`. A field containing `|`, `"`, or a
//! line break is wrapped in double quotes with inner quotes doubled, so
//! every identity survives a round trip.

use serde::{Deserialize, Serialize};

use crate::error::{GrantError, Result};

const DELIMITER: char = '|';
const QUOTE: char = '"';
const FIELD_COUNT: usize = 5;

/// The durable key of a declared grant. Every field is immutable; changing
/// one means a different grant.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GrantIdentity {
    /// Name of the target object (or the database, for objects that live
    /// inside one).
    pub resource_name: String,
    /// Schema part of the target, when the kind lives in a schema.
    #[serde(default)]
    pub schema_name: String,
    /// Object part of the target. Empty on a schema-level kind means a
    /// future grant.
    #[serde(default)]
    pub object_name: String,
    /// The privilege being granted.
    pub privilege: String,
    /// Whether grantees may grant the privilege onward.
    #[serde(default)]
    pub grant_option: bool,
}

impl GrantIdentity {
    /// Identity of a grant on an object addressed by a single name.
    pub fn new(resource_name: impl Into<String>, privilege: impl Into<String>, grant_option: bool) -> Self {
        Self {
            resource_name: resource_name.into(),
            privilege: privilege.into(),
            grant_option,
            ..Default::default()
        }
    }

    /// Set the schema part of the target.
    pub fn with_schema(mut self, schema_name: impl Into<String>) -> Self {
        self.schema_name = schema_name.into();
        self
    }

    /// Set the object part of the target.
    pub fn with_object(mut self, object_name: impl Into<String>) -> Self {
        self.object_name = object_name.into();
        self
    }

    /// Encode into the external ID.
    pub fn encode(&self) -> Result<String> {
        if self.resource_name.is_empty() {
            return Err(GrantError::Encoding("resource name is empty".to_owned()));
        }
        if self.privilege.is_empty() {
            return Err(GrantError::Encoding("privilege is empty".to_owned()));
        }

        let grant_option = self.grant_option.to_string();
        let fields = [
            self.resource_name.as_str(),
            self.schema_name.as_str(),
            self.object_name.as_str(),
            self.privilege.as_str(),
            grant_option.as_str(),
        ];
        Ok(fields
            .iter()
            .map(|f| escape_field(f))
            .collect::<Vec<_>>()
            .join(&DELIMITER.to_string()))
    }

    /// Decode an external ID produced by [`GrantIdentity::encode`].
    pub fn decode(id: &str) -> Result<Self> {
        let fields = split_fields(id)?;
        let [resource_name, schema_name, object_name, privilege, grant_option]: [String; FIELD_COUNT] =
            fields.try_into().map_err(|f: Vec<String>| {
                GrantError::malformed(
                    id,
                    format!("expected {FIELD_COUNT} fields, found {}", f.len()),
                )
            })?;

        let grant_option = match grant_option.as_str() {
            "true" => true,
            "false" => false,
            other => {
                return Err(GrantError::malformed(
                    id,
                    format!("grant option must be true or false, found {other:?}"),
                ))
            }
        };
        if resource_name.is_empty() {
            return Err(GrantError::malformed(id, "resource name is empty"));
        }
        if privilege.is_empty() {
            return Err(GrantError::malformed(id, "privilege is empty"));
        }

        Ok(Self {
            resource_name,
            schema_name,
            object_name,
            privilege,
            grant_option,
        })
    }
}

fn escape_field(field: &str) -> String {
    if field.contains([DELIMITER, QUOTE, '\n', '\r']) {
        let doubled = field.replace(QUOTE, "\"\"");
        format!("{QUOTE}{doubled}{QUOTE}")
    } else {
        field.to_owned()
    }
}

fn split_fields(id: &str) -> Result<Vec<String>> {
    let mut fields = vec![];
    let mut chars = id.chars().peekable();

    loop {
        let mut field = String::new();
        if chars.peek() == Some(&QUOTE) {
            chars.next();
            loop {
                match chars.next() {
                    Some(QUOTE) if chars.peek() == Some(&QUOTE) => {
                        chars.next();
                        field.push(QUOTE);
                    }
                    Some(QUOTE) => break,
                    Some(c) => field.push(c),
                    None => return Err(GrantError::malformed(id, "unterminated quoted field")),
                }
            }
            match chars.peek() {
                None | Some(&DELIMITER) => (),
                Some(c) => {
                    return Err(GrantError::malformed(
                        id,
                        format!("unexpected {c:?} after quoted field"),
                    ))
                }
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c == DELIMITER {
                    break;
                }
                if c == QUOTE {
                    return Err(GrantError::malformed(id, "stray quote in unquoted field"));
                }
                field.push(c);
                chars.next();
            }
        }
        fields.push(field);

        match chars.next() {
            Some(DELIMITER) => continue,
            None => break,
            // Unreachable: both branches above stop on a delimiter or the end.
            Some(c) => return Err(GrantError::malformed(id, format!("unexpected {c:?}"))),
        }
    }

    Ok(fields)
}
