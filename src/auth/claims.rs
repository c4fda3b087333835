//! End-user claims captured out-of-band (typically from the user's ID token).

// crates.io
use serde_json::{Map, Value};
// self
use crate::_prelude::*;

/// Claim carrying the organization the user signed in through.
pub const ORGANIZATION_CLAIM: &str = "user_org";

/// Arbitrary claim mapping for one end user.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserClaims(Map<String, Value>);
impl UserClaims {
	/// Wraps an existing claim map.
	pub fn new(claims: Map<String, Value>) -> Self {
		Self(claims)
	}

	/// Convenience constructor for claims carrying only an organization.
	pub fn with_organization(org: impl Into<String>) -> Self {
		let mut claims = Map::new();

		claims.insert(ORGANIZATION_CLAIM.into(), Value::String(org.into()));

		Self(claims)
	}

	/// Adds or replaces a claim.
	pub fn insert(&mut self, name: impl Into<String>, value: Value) -> &mut Self {
		self.0.insert(name.into(), value);

		self
	}

	/// Returns a raw claim value.
	pub fn get(&self, name: &str) -> Option<&Value> {
		self.0.get(name)
	}

	/// Organization identifier, when present as a non-empty string.
	pub fn organization(&self) -> Option<&str> {
		self.0.get(ORGANIZATION_CLAIM).and_then(Value::as_str).filter(|org| !org.is_empty())
	}
}
impl From<Map<String, Value>> for UserClaims {
	fn from(value: Map<String, Value>) -> Self {
		Self(value)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn organization_requires_non_empty_string() {
		assert_eq!(UserClaims::with_organization("acme").organization(), Some("acme"));
		assert_eq!(UserClaims::with_organization("").organization(), None);

		let mut numeric = UserClaims::default();

		numeric.insert(ORGANIZATION_CLAIM, Value::from(7));

		assert_eq!(numeric.organization(), None);
	}

	#[test]
	fn claims_deserialize_from_plain_objects() {
		let claims: UserClaims = serde_json::from_str("{\"user_org\":\"acme\",\"sub\":\"alice\"}")
			.expect("Claims should deserialize.");

		assert_eq!(claims.organization(), Some("acme"));
		assert_eq!(claims.get("sub"), Some(&Value::from("alice")));
	}
}
