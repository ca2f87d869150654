//! Typed property registry.
//!
//! Named, strongly-typed settings populated from layered sources (files,
//! command-line arguments, environment variables, in-memory vectors, other
//! registries), validated against per-property rules, tracked for
//! provenance and modification, and serialized back out as sectioned
//! `key=value` text.
//!
//! The pieces, leaves first:
//!
//! - [`codec::Codec`] — value ↔ text conversion per supported type.
//! - [`enumdict::EnumDictionary`] — shared code ↔ name table behind an
//!   atomically-installed slot.
//! - [`validators`] — accept/reject rules run before any mutation.
//! - [`property`] — one typed, validated setting behind a type-erased cell.
//! - [`properties::Properties`] — the registry: layered load/store,
//!   section scoping, presets, mandatory and checksum validation.
//! - [`meta::MetaProperties`] — housekeeping settings attached to every
//!   registry.
//! - [`context::ArgsContext`] — explicit command-line settings assembly.
//!
//! Registries are single-writer; see [`properties`] for the concurrency
//! contract.

pub mod codec;
pub mod context;
pub mod enumdict;
pub mod error;
pub mod flags;
pub mod meta;
pub mod properties;
pub mod property;
pub mod validators;
pub mod verify;

pub use codec::Codec;
pub use context::{ArgsContext, SettingsMode};
pub use enumdict::{EnumDictionary, EnumSlot, EnumValue};
pub use error::{PropError, Result};
pub use flags::{PropertyFlags, Source, StoreFlags};
pub use meta::{DuplicateSectionPolicy, MetaProperties, UnknownFieldPolicy};
pub use properties::{
	PresetModification, PresetStatus, Properties, RegistryHooks, RejectedField,
};
pub use property::{PropKey, Property, PropertyDef};
pub use validators::{Validator, ValidatorRef};
pub use verify::{VerificationStatus, Verify};
