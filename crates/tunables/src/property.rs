//! A single named, typed, validated property.
//!
//! The registry stores properties type-erased behind [`PropertyCell`];
//! typed access goes through [`PropKey`] handles handed out at registration
//! time, so the common read path is an index plus a downcast, no string
//! lookup.

use std::any::Any;
use std::marker::PhantomData;

use crate::codec::Codec;
use crate::flags::{PropertyFlags, Source};
use crate::properties::Properties;
use crate::validators::ValidatorRef;
use crate::verify::{VerificationStatus, Verify};

/// Type-erased storage cell: the part of a property that depends on `T`.
pub(crate) trait PropertyCell: Send + Sync {
	/// Unconditional trusted decode of already-validated text.
	fn sync(&mut self, text: &str);

	fn encode(&self) -> String;

	fn type_tag(&self) -> &'static str;

	/// Restore the registration-time default.
	fn set_default(&mut self);

	fn default_text(&self) -> String;

	fn verifier(&self) -> Option<&(dyn Verify + Send + Sync)>;

	fn as_any(&self) -> &dyn Any;

	fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Concrete cell for a value of type `T`.
///
/// Invariant: after `sync(text)`, `value` equals `decode(text)` applied to
/// the previous value (a failed decode keeps it, per the codec contract).
pub(crate) struct ProperT<T: Codec> {
	pub(crate) value: T,
	default: T,
	verifier: Option<Box<dyn Verify + Send + Sync>>,
}

impl<T: Codec> ProperT<T> {
	fn new(default: T, verifier: Option<Box<dyn Verify + Send + Sync>>) -> Self {
		Self {
			value: default.clone(),
			default,
			verifier,
		}
	}
}

impl<T: Codec> PropertyCell for ProperT<T> {
	fn sync(&mut self, text: &str) {
		self.value.decode(text);
	}

	fn encode(&self) -> String {
		self.value.encode()
	}

	fn type_tag(&self) -> &'static str {
		T::type_tag()
	}

	fn set_default(&mut self) {
		self.value = self.default.clone();
	}

	fn default_text(&self) -> String {
		self.default.encode()
	}

	fn verifier(&self) -> Option<&(dyn Verify + Send + Sync)> {
		self.verifier.as_deref()
	}

	fn as_any(&self) -> &dyn Any {
		self
	}

	fn as_any_mut(&mut self) -> &mut dyn Any {
		self
	}
}

/// Declarative registration record for a property of type `T`.
pub struct PropertyDef<T: Codec> {
	name: String,
	desc: String,
	default: T,
	flags: PropertyFlags,
	mandatory: bool,
	validator: Option<ValidatorRef>,
	verifier: Option<Box<dyn Verify + Send + Sync>>,
}

impl<T: Codec> PropertyDef<T> {
	pub fn new(name: impl Into<String>, default: T) -> Self {
		Self {
			name: name.into(),
			desc: String::new(),
			default,
			flags: PropertyFlags::DEFAULT,
			mandatory: false,
			validator: None,
			verifier: None,
		}
	}

	pub fn desc(mut self, desc: impl Into<String>) -> Self {
		self.desc = desc.into();
		self
	}

	pub fn flags(mut self, flags: PropertyFlags) -> Self {
		self.flags = flags;
		self
	}

	/// A mandatory property must be supplied by some load before
	/// `validate_mandatory` passes.
	pub fn mandatory(mut self) -> Self {
		self.mandatory = true;
		self
	}

	pub fn validator(mut self, validator: ValidatorRef) -> Self {
		self.validator = Some(validator);
		self
	}

	pub fn verifier(mut self, verifier: Box<dyn Verify + Send + Sync>) -> Self {
		self.verifier = Some(verifier);
		self
	}

	pub(crate) fn build(self) -> Property {
		// no explicit validator: fall back to the type's implicit one
		let validator = self.validator.or_else(T::default_validator);
		Property {
			name: self.name.into_boxed_str(),
			desc: self.desc.into_boxed_str(),
			flags: self.flags,
			loaded: Source::empty(),
			modified: false,
			mandatory: self.mandatory,
			validator,
			cell: Box::new(ProperT::new(self.default, self.verifier)),
		}
	}
}

/// One registered property: identity, policy bits, provenance, and the
/// type-erased value cell.
pub struct Property {
	name: Box<str>,
	desc: Box<str>,
	pub(crate) flags: PropertyFlags,
	pub(crate) loaded: Source,
	pub(crate) modified: bool,
	pub(crate) mandatory: bool,
	pub(crate) validator: Option<ValidatorRef>,
	pub(crate) cell: Box<dyn PropertyCell>,
}

impl Property {
	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn desc(&self) -> &str {
		&self.desc
	}

	pub fn flags(&self) -> PropertyFlags {
		self.flags
	}

	/// Provenance bits; empty means the default is still in place.
	pub fn loaded(&self) -> Source {
		self.loaded
	}

	pub fn is_modified(&self) -> bool {
		self.modified
	}

	pub fn is_mandatory(&self) -> bool {
		self.mandatory
	}

	pub fn type_tag(&self) -> &'static str {
		self.cell.type_tag()
	}

	pub fn encode(&self) -> String {
		self.cell.encode()
	}

	pub(crate) fn default_text(&self) -> String {
		self.cell.default_text()
	}

	/// Judge `val` without mutating anything. No validator means valid.
	pub fn validate(&self, val: &str, container: &Properties) -> Result<(), String> {
		match &self.validator {
			Some(v) => v.get().validate(&self.name, val, container),
			None => Ok(()),
		}
	}

	/// The legal values, when the attached validator can enumerate them.
	pub fn possible_values(&self) -> Option<(Vec<String>, i32)> {
		self.validator.as_ref().and_then(|v| v.get().possible_values())
	}

	pub fn requires_verification(&self) -> bool {
		self.cell.verifier().is_some()
	}

	/// Actively verify; a property without a verifier reports inactive.
	pub fn verify(&self) -> VerificationStatus {
		match self.cell.verifier() {
			Some(v) => v.verify(),
			None => VerificationStatus::Inactive,
		}
	}

	/// Boolean collapse of the four verification states: only an outright
	/// failure counts as false.
	pub fn verify_if_required(&self) -> bool {
		!self.requires_verification() || self.verify() != VerificationStatus::Failed
	}

	pub fn last_verification_status(&self) -> VerificationStatus {
		match self.cell.verifier() {
			Some(v) => v.last_status(),
			None => VerificationStatus::Inactive,
		}
	}

	pub fn deactivate_verification(&self) {
		if let Some(v) = self.cell.verifier() {
			v.deactivate();
		}
	}

	pub fn set_verification_precision(&self, precision: Option<f64>) {
		if let Some(v) = self.cell.verifier() {
			v.set_precision(precision);
		}
	}
}

/// Typed handle to a registered property: slot index plus phantom type.
///
/// Only valid for the registry that issued it.
pub struct PropKey<T> {
	pub(crate) slot: usize,
	pub(crate) _marker: PhantomData<fn() -> T>,
}

impl<T> PropKey<T> {
	pub(crate) fn new(slot: usize) -> Self {
		Self {
			slot,
			_marker: PhantomData,
		}
	}
}

impl<T> Clone for PropKey<T> {
	fn clone(&self) -> Self {
		*self
	}
}

impl<T> Copy for PropKey<T> {}

impl<T> std::fmt::Debug for PropKey<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_tuple("PropKey").field(&self.slot).finish()
	}
}
