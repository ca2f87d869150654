//! Housekeeping sub-registry attached to every ordinary registry.
//!
//! Meta settings are themselves properties, so they load, validate and
//! store through the same machinery they configure. The meta registry has
//! no meta of its own.

use crate::flags::PropertyFlags;
use crate::properties::Properties;
use crate::property::{PropKey, PropertyDef};
use crate::validators::{ExactNamesValidator, ValidatorRef};

/// How to treat a key that matches no registered property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownFieldPolicy {
	#[default]
	Ignore,
	Warn,
	Abort,
}

/// How to treat a repeated `[section]` header within one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicateSectionPolicy {
	/// Later occurrences merge into the section (last writer wins).
	#[default]
	Merge,
	/// Only the first occurrence's content is loaded.
	First,
	/// A repeat aborts the load.
	Abort,
}

/// The fixed meta settings: unknown-field policy, verbosity, type tag,
/// duplicate-section policy.
pub struct MetaProperties {
	reg: Properties,
	unknown_policy: PropKey<String>,
	verbosity: PropKey<u32>,
	type_tag: PropKey<String>,
	duplicate_policy: PropKey<String>,
}

impl MetaProperties {
	pub(crate) fn new(type_tag: &str) -> Self {
		let mut reg = Properties::bare("meta");
		let flags = PropertyFlags::DEFAULT | PropertyFlags::META;
		let unknown_policy = reg.define(
			PropertyDef::new("unknownFieldPolicy", "ignore".to_string())
				.desc("how to treat unregistered keys in loaded input")
				.flags(flags)
				.validator(ValidatorRef::owned(ExactNamesValidator::new(&[
					"ignore", "warn", "abort",
				]))),
		);
		let verbosity = reg.define(
			PropertyDef::new("verbosity", 1u32)
				.desc("diagnostic narration level; 0 is silent")
				.flags(flags),
		);
		let tag = reg.define(
			PropertyDef::new("type", type_tag.to_string())
				.desc("registry type tag")
				.flags(flags),
		);
		let duplicate_policy = reg.define(
			PropertyDef::new("duplicateSectionPolicy", "merge".to_string())
				.desc("how to treat repeated section headers")
				.flags(flags)
				.validator(ValidatorRef::owned(ExactNamesValidator::new(&[
					"merge", "first", "abort",
				]))),
		);
		Self {
			reg,
			unknown_policy,
			verbosity,
			type_tag: tag,
			duplicate_policy,
		}
	}

	pub fn unknown_field_policy(&self) -> UnknownFieldPolicy {
		match self.reg.value(self.unknown_policy).as_str() {
			"warn" => UnknownFieldPolicy::Warn,
			"abort" => UnknownFieldPolicy::Abort,
			_ => UnknownFieldPolicy::Ignore,
		}
	}

	pub fn set_unknown_field_policy(&mut self, policy: UnknownFieldPolicy) {
		let text = match policy {
			UnknownFieldPolicy::Ignore => "ignore",
			UnknownFieldPolicy::Warn => "warn",
			UnknownFieldPolicy::Abort => "abort",
		};
		self.reg.set(self.unknown_policy, text.to_string());
	}

	pub fn verbosity(&self) -> u32 {
		self.reg.value(self.verbosity)
	}

	pub fn set_verbosity(&mut self, level: u32) {
		self.reg.set(self.verbosity, level);
	}

	pub fn type_tag(&self) -> String {
		self.reg.value(self.type_tag)
	}

	pub fn duplicate_section_policy(&self) -> DuplicateSectionPolicy {
		match self.reg.value(self.duplicate_policy).as_str() {
			"first" => DuplicateSectionPolicy::First,
			"abort" => DuplicateSectionPolicy::Abort,
			_ => DuplicateSectionPolicy::Merge,
		}
	}

	pub fn set_duplicate_section_policy(&mut self, policy: DuplicateSectionPolicy) {
		let text = match policy {
			DuplicateSectionPolicy::Merge => "merge",
			DuplicateSectionPolicy::First => "first",
			DuplicateSectionPolicy::Abort => "abort",
		};
		self.reg.set(self.duplicate_policy, text.to_string());
	}

	/// The backing registry, for loading or storing meta settings as text.
	pub fn registry(&self) -> &Properties {
		&self.reg
	}

	pub fn registry_mut(&mut self) -> &mut Properties {
		&mut self.reg
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_defaults() {
		let meta = MetaProperties::new("net");
		assert_eq!(meta.unknown_field_policy(), UnknownFieldPolicy::Ignore);
		assert_eq!(meta.duplicate_section_policy(), DuplicateSectionPolicy::Merge);
		assert_eq!(meta.verbosity(), 1);
		assert_eq!(meta.type_tag(), "net");
	}

	#[test]
	fn test_policies_round_trip() {
		let mut meta = MetaProperties::new("net");
		meta.set_unknown_field_policy(UnknownFieldPolicy::Abort);
		assert_eq!(meta.unknown_field_policy(), UnknownFieldPolicy::Abort);
		meta.set_duplicate_section_policy(DuplicateSectionPolicy::First);
		assert_eq!(meta.duplicate_section_policy(), DuplicateSectionPolicy::First);
	}

	#[test]
	fn test_policy_strings_are_validated() {
		let mut meta = MetaProperties::new("net");
		assert!(!meta.registry_mut().set_property("unknownFieldPolicy", "explode"));
		assert_eq!(meta.unknown_field_policy(), UnknownFieldPolicy::Ignore);
	}

	#[test]
	fn test_meta_settings_load_as_text() {
		let mut meta = MetaProperties::new("net");
		let ok = meta
			.registry_mut()
			.load("verbosity=0\nduplicateSectionPolicy=abort\n")
			.unwrap();
		assert!(ok);
		assert_eq!(meta.verbosity(), 0);
		assert_eq!(meta.duplicate_section_policy(), DuplicateSectionPolicy::Abort);
	}
}
