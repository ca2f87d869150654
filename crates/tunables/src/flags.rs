//! Bitmask types: property flags, provenance bits, store options.

use bitflags::bitflags;

bitflags! {
	/// Flags controlling export policy, persistence class, and semantic tags
	/// of a single property.
	#[derive(Debug, Clone, Copy, PartialEq, Eq)]
	pub struct PropertyFlags: u32 {
		/// Exported by persistent stores.
		const PERSISTENT = 1 << 0;
		/// Never exported unless non-persistent export is requested.
		const VOLATILE = 1 << 1;
		/// Always exported by plain stores.
		const VISIBLE = 1 << 2;
		/// Exported only if loaded or explicitly set.
		const HIDDEN = 1 << 3;
		/// Exported unconditionally, regardless of load state.
		const ALWAYS = 1 << 4;
		/// Assignments to this property are rejected outright.
		const FORBIDDEN = 1 << 5;
		/// Accepted but flagged as deprecated in diagnostics.
		const DEPRECATED = 1 << 6;
		/// Belongs to a meta sub-registry.
		const META = 1 << 7;
		/// Covered by the aggregate checksum check.
		const CHECKSUM = 1 << 8;

		const DEFAULT = Self::PERSISTENT.bits() | Self::HIDDEN.bits();
	}
}

bitflags! {
	/// Provenance bits: which sources have ever supplied a property's value.
	///
	/// An empty set means the property still holds its default
	/// (`NOT_LOADED`). Bits are OR-combined; the registry never reorders
	/// sources, so precedence is whatever load order the caller chose.
	#[derive(Debug, Clone, Copy, PartialEq, Eq)]
	pub struct Source: u32 {
		/// From a file or in-memory document.
		const FILE = 1 << 0;
		/// From command-line arguments.
		const ARGS = 1 << 1;
		/// From environment variables.
		const ENV = 1 << 2;
		/// From a key=value vector.
		const VEC = 1 << 3;
		/// Explicitly set by the user through a typed setter.
		const USER = 1 << 4;
		/// From the preset/project section.
		const PROJECT = 1 << 5;
		/// A file load failed; set so later reads don't assert on "never loaded".
		const FAILED = 1 << 6;
		/// A preset-seen value was later overridden by another source.
		const PRESETS_MODIFIED = 1 << 7;
		/// A preset-seen value was overridden with a value that failed validation.
		const PRESETS_MODIFIED_FAILED = 1 << 8;
		/// A preset value was overwritten by a later preset reload.
		const PRESETS_OVERWRITTEN = 1 << 9;
	}
}

impl Source {
	/// Sources that take precedence over presets for `update_presets`.
	pub(crate) const NON_PRESET: Source = Source::FILE
		.union(Source::ARGS)
		.union(Source::ENV)
		.union(Source::VEC)
		.union(Source::USER);
}

bitflags! {
	/// Options selecting which properties a store pass emits.
	#[derive(Debug, Clone, Copy, PartialEq, Eq)]
	pub struct StoreFlags: u32 {
		/// Emit every persistent property, loaded or not.
		const ALL_PERSISTENT = 1 << 0;
		/// Also emit volatile properties.
		const NON_PERSISTENT = 1 << 1;
		/// Emit each property's description as a `#` comment line.
		const DESCRIPTION = 1 << 2;
		/// Also emit checksum-covered properties.
		const CHECKSUM = 1 << 3;
		/// Emit registered properties only (never free parameters).
		const REGISTERED_ONLY = 1 << 4;
		/// Emit only properties that came from the preset section.
		const PRESETS_ONLY = 1 << 5;
	}
}
