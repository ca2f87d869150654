//! The property registry: an ordered collection of typed properties with
//! layered loading, section-scoped parsing, validation, provenance and
//! preset tracking, and serialization.
//!
//! Every load path funnels into one commit algorithm: look the key up,
//! validate before touching anything, decode into the typed cell, update
//! the string mirror, OR the provenance bit, and diff-mark modification.
//! One bad line never aborts a load; problems land in the rejected and
//! unknown lists instead.
//!
//! A registry is a single-writer structure: callers serialize access to one
//! instance themselves. Only the enumeration dictionary slot (see
//! [`crate::enumdict`]) is safe for concurrent first-time initialization.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use crate::codec::Codec;
use crate::error::{PropError, Result};
use crate::flags::{PropertyFlags, Source, StoreFlags};
use crate::meta::{DuplicateSectionPolicy, MetaProperties, UnknownFieldPolicy};
use crate::property::{PropKey, ProperT, Property, PropertyDef};

/// Preset load lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PresetStatus {
	#[default]
	Uninitialized,
	Loading,
	Loaded,
}

/// Whether any preset-seen key was later overridden by a non-preset source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PresetModification {
	#[default]
	None,
	Modified,
	/// A non-preset override was attempted but failed validation.
	ModifiedFailed,
}

/// A value that failed validation, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedField {
	pub key: String,
	pub value: String,
	pub reason: String,
}

/// Hook points for derived registries; every default is a no-op.
pub trait RegistryHooks {
	fn on_modified(&mut self, _key: &str, _value: &str) {}
	fn on_rejected(&mut self, _key: &str, _value: &str, _reason: &str) {}
	fn on_loaded(&mut self) {}
	fn post_loaded(&mut self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommitOutcome {
	Committed,
	Rejected,
	Unknown,
	Skipped,
}

#[derive(Clone, Copy)]
struct CommitOpts {
	source: Source,
	/// Run the validator; `false` only for trusted internal replay.
	checked: bool,
	/// Mark preset-seen properties PRESETS_OVERWRITTEN on change.
	preset_replay: bool,
	/// Leave properties already touched by a non-preset source alone.
	skip_non_preset: bool,
}

impl CommitOpts {
	fn checked(source: Source) -> Self {
		Self {
			source,
			checked: true,
			preset_replay: false,
			skip_non_preset: false,
		}
	}
}

#[derive(Clone)]
struct PresetCache {
	text: String,
	sep: char,
	section: String,
}

/// Ordered collection of [`Property`] entries keyed by name, plus the raw
/// string mirror and provenance bookkeeping.
pub struct Properties {
	name: String,
	file_name: String,
	preset_name: String,
	default_separator: char,
	props: Vec<Property>,
	index: FxHashMap<String, usize>,
	/// Last-committed textual value per key, in canonical form.
	map: BTreeMap<String, String>,
	/// Value held immediately before the most recent modification.
	modified_map: BTreeMap<String, String>,
	rejected: Vec<RejectedField>,
	unknown: Vec<(String, String)>,
	loaded: Source,
	section_found: bool,
	preset_status: PresetStatus,
	modified_presets: PresetModification,
	preset_cache: Option<PresetCache>,
	meta: Option<Box<MetaProperties>>,
	hooks: Option<Box<dyn RegistryHooks + Send>>,
}

impl Properties {
	/// A registry named `name` (used as the default `[section]` header),
	/// with its meta sub-registry attached.
	pub fn new(name: impl Into<String>) -> Self {
		let name = name.into();
		let mut reg = Self::bare(name.clone());
		reg.meta = Some(Box::new(MetaProperties::new(&name)));
		reg
	}

	/// A registry without a meta sub-registry; used for the meta registry
	/// itself.
	pub(crate) fn bare(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			file_name: String::new(),
			preset_name: String::new(),
			default_separator: '=',
			props: Vec::new(),
			index: FxHashMap::default(),
			map: BTreeMap::new(),
			modified_map: BTreeMap::new(),
			rejected: Vec::new(),
			unknown: Vec::new(),
			loaded: Source::empty(),
			section_found: false,
			preset_status: PresetStatus::default(),
			modified_presets: PresetModification::default(),
			preset_cache: None,
			meta: None,
			hooks: None,
		}
	}

	// -- registration ------------------------------------------------------

	/// Registers a property and returns its typed handle.
	///
	/// A duplicate name keeps the first registration and returns a handle
	/// to it; the new definition is dropped.
	pub fn define<T: Codec>(&mut self, def: PropertyDef<T>) -> PropKey<T> {
		let prop = def.build();
		if let Some(&slot) = self.index.get(prop.name()) {
			debug!(key = prop.name(), "duplicate registration ignored");
			return PropKey::new(slot);
		}
		let slot = self.props.len();
		self.index.insert(prop.name().to_string(), slot);
		self.map.insert(prop.name().to_string(), prop.encode());
		self.props.push(prop);
		PropKey::new(slot)
	}

	pub fn find(&self, name: &str) -> Option<&Property> {
		self.index.get(name).map(|&slot| &self.props[slot])
	}

	pub fn desc(&self, name: &str) -> Option<&str> {
		self.find(name).map(|p| p.desc())
	}

	/// Legal values for `name`, when its validator can enumerate them.
	pub fn possible_values(&self, name: &str) -> Option<(Vec<String>, i32)> {
		self.find(name).and_then(|p| p.possible_values())
	}

	pub fn names(&self) -> impl Iterator<Item = &str> {
		self.props.iter().map(|p| p.name())
	}

	pub fn len(&self) -> usize {
		self.props.len()
	}

	pub fn is_empty(&self) -> bool {
		self.props.is_empty()
	}

	// -- typed access ------------------------------------------------------

	/// Current value behind a typed handle.
	///
	/// Invokes the attached verification strategy's read hook, if any.
	///
	/// # Panics
	///
	/// Panics if `key` was issued by a different registry whose slot holds
	/// another type.
	pub fn value<T: Codec>(&self, key: PropKey<T>) -> T {
		let prop = &self.props[key.slot];
		if let Some(v) = prop.cell.verifier() {
			v.verify_on_read();
		}
		let cell = prop
			.cell
			.as_any()
			.downcast_ref::<ProperT<T>>()
			.unwrap_or_else(|| panic!("property '{}' holds a different type", prop.name()));
		cell.value.clone()
	}

	/// Typed setter: encode, validate, commit. Returns whether the commit
	/// succeeded.
	pub fn set<T: Codec>(&mut self, key: PropKey<T>, value: T) -> bool {
		let name = self.props[key.slot].name().to_string();
		let text = value.encode();
		matches!(
			self.commit_pair(&name, &text, CommitOpts::checked(Source::USER)),
			Ok(CommitOutcome::Committed)
		)
	}

	/// Generic string setter through the full validate/commit path.
	pub fn set_property(&mut self, name: &str, value: &str) -> bool {
		matches!(
			self.commit_pair(name, value, CommitOpts::checked(Source::USER)),
			Ok(CommitOutcome::Committed)
		)
	}

	/// Last-committed textual value.
	pub fn raw(&self, name: &str) -> Option<&str> {
		self.map.get(name).map(String::as_str)
	}

	pub fn get_or(&self, name: &str, default: &str) -> String {
		self.raw(name).unwrap_or(default).to_string()
	}

	/// Decode the mirrored text over `T::default()`; a missing key or a
	/// failed decode yields the default.
	pub fn get_as<T: Codec + Default>(&self, name: &str) -> T {
		let mut v = T::default();
		if let Some(text) = self.map.get(name) {
			v.decode(text);
		}
		v
	}

	/// Trusted replay of the string mirror into every typed cell.
	pub fn sync(&mut self) {
		for prop in &mut self.props {
			if let Some(text) = self.map.get(prop.name()) {
				let text = text.clone();
				prop.cell.sync(&text);
			}
		}
	}

	// -- load fronts -------------------------------------------------------

	/// Loads sectioned `key<sep>value` text. An empty `section` loads every
	/// pair from every section.
	///
	/// Returns `Ok(true)` only if every line matching the active section
	/// committed; unknown keys and out-of-section lines don't count against
	/// success. `Err` only on policy-driven aborts.
	pub fn load_str(&mut self, text: &str, sep: char, section: &str, source: Source) -> Result<bool> {
		self.load_walk(text, sep, section, CommitOpts::checked(source))
	}

	/// [`load_str`](Self::load_str) with the default separator, no section
	/// filter, and file provenance.
	pub fn load(&mut self, text: &str) -> Result<bool> {
		self.load_str(text, self.default_separator, "", Source::FILE)
	}

	/// Reads and loads a file. Rejects non-printable contents; a failed
	/// read sets the FAILED provenance bit before returning the error.
	pub fn load_file(&mut self, path: impl AsRef<Path>, sep: char, section: &str) -> Result<bool> {
		let path = path.as_ref();
		let contents = match std::fs::read_to_string(path) {
			Ok(c) => c,
			Err(error) => {
				self.loaded |= Source::FAILED;
				return Err(PropError::Io {
					path: path.to_path_buf(),
					error,
				});
			}
		};
		if contents
			.chars()
			.any(|c| c.is_control() && c != '\n' && c != '\r' && c != '\t')
		{
			self.loaded |= Source::FAILED;
			return Err(PropError::NotPrintable {
				path: path.to_path_buf(),
			});
		}
		self.file_name = path.display().to_string();
		self.load_str(&contents, sep, section, Source::FILE)
	}

	/// Loads command-line form: `name:` switches section, `key=value`
	/// assigns.
	pub fn load_args(&mut self, args: &[String], section: &str) -> Result<bool> {
		let mut text = String::new();
		for arg in args {
			match arg.strip_suffix(':') {
				Some(name) => {
					let _ = writeln!(text, "[{name}]");
				}
				None => {
					text.push_str(arg);
					text.push('\n');
				}
			}
		}
		self.load_walk(&text, '=', section, CommitOpts::checked(Source::ARGS))
	}

	/// Loads environment pairs. Only registered keys are considered; the
	/// environment is a shared namespace, so foreign variables are neither
	/// unknown nor an error.
	pub fn load_env<'a>(&mut self, vars: impl IntoIterator<Item = (&'a str, &'a str)>) -> Result<bool> {
		let mut success = true;
		for (key, val) in vars {
			if !self.index.contains_key(key) {
				continue;
			}
			if self.commit_pair(key, val, CommitOpts::checked(Source::ENV))? == CommitOutcome::Rejected {
				success = false;
			}
		}
		self.finish_load();
		Ok(success)
	}

	/// Loads a section-less `key=value` vector.
	pub fn load_vec(&mut self, pairs: &[String]) -> Result<bool> {
		let mut success = true;
		for pair in pairs {
			let Some((key, val)) = pair.split_once('=') else {
				self.rejected.push(RejectedField {
					key: pair.clone(),
					value: String::new(),
					reason: "missing separator".to_string(),
				});
				success = false;
				continue;
			};
			if self.commit_pair(key.trim(), val.trim(), CommitOpts::checked(Source::VEC))?
				== CommitOutcome::Rejected
			{
				success = false;
			}
		}
		self.finish_load();
		Ok(success)
	}

	/// Loads an already-split canonical key→value map.
	pub fn load_canonical(&mut self, pairs: &BTreeMap<String, String>) -> Result<bool> {
		let mut success = true;
		for (key, val) in pairs {
			if self.commit_pair(key, val, CommitOpts::checked(Source::VEC))? == CommitOutcome::Rejected {
				success = false;
			}
		}
		self.finish_load();
		Ok(success)
	}

	/// Copies values of identically-named loaded properties from another
	/// registry, through the full validate/commit path.
	pub fn load_matching(&mut self, other: &Properties) -> Result<bool> {
		let mut success = true;
		for prop in &other.props {
			if prop.loaded().is_empty() || !self.index.contains_key(prop.name()) {
				continue;
			}
			let text = prop.encode();
			if self.commit_pair(prop.name(), &text, CommitOpts::checked(Source::VEC))?
				== CommitOutcome::Rejected
			{
				success = false;
			}
		}
		self.finish_load();
		Ok(success)
	}

	/// Commits a single pair without validation. For trusted values only.
	pub fn load_unchecked(&mut self, key: &str, value: &str) -> bool {
		let opts = CommitOpts {
			source: Source::USER,
			checked: false,
			preset_replay: false,
			skip_non_preset: false,
		};
		matches!(self.commit_pair(key, value, opts), Ok(CommitOutcome::Committed))
	}

	/// Recognizes and removes `key=value` entries for registered keys from
	/// an argument vector, committing each. Unrecognized entries stay.
	pub fn cut(&mut self, args: &mut Vec<String>) -> Result<bool> {
		let mut success = true;
		let mut remaining = Vec::with_capacity(args.len());
		for arg in args.drain(..) {
			let recognized = arg
				.split_once('=')
				.map(|(k, _)| self.index.contains_key(k.trim()))
				.unwrap_or(false);
			if !recognized {
				remaining.push(arg);
				continue;
			}
			let (key, val) = arg.split_once('=').unwrap_or((arg.as_str(), ""));
			if self.commit_pair(key.trim(), val.trim(), CommitOpts::checked(Source::ARGS))?
				== CommitOutcome::Rejected
			{
				success = false;
			}
		}
		*args = remaining;
		self.finish_load();
		Ok(success)
	}

	/// Appends every loaded property as a `key=value` argument, the inverse
	/// of [`cut`](Self::cut).
	pub fn absorb(&self, args: &mut Vec<String>) {
		for prop in &self.props {
			if !prop.loaded().is_empty() {
				args.push(format!("{}={}", prop.name(), prop.encode()));
			}
		}
	}

	// -- presets -----------------------------------------------------------

	/// Loads a preset section; the text is cached so presets can later be
	/// refreshed without re-parsing non-preset sources.
	pub fn load_presets(&mut self, text: &str, sep: char, section: &str) -> Result<bool> {
		self.preset_status = PresetStatus::Loading;
		self.preset_cache = Some(PresetCache {
			text: text.to_string(),
			sep,
			section: section.to_string(),
		});
		self.preset_name = section.to_string();
		let ok = self.load_walk(text, sep, section, CommitOpts::checked(Source::PROJECT))?;
		self.preset_status = PresetStatus::Loaded;
		Ok(ok)
	}

	/// Replays the cached preset text in full, clearing modified-preset
	/// state; preset-seen properties that change are marked overwritten.
	pub fn reload_presets(&mut self) -> Result<bool> {
		let Some(cache) = self.preset_cache.clone() else {
			return Ok(false);
		};
		self.modified_presets = PresetModification::None;
		self.preset_status = PresetStatus::Loading;
		let opts = CommitOpts {
			source: Source::PROJECT,
			checked: true,
			preset_replay: true,
			skip_non_preset: false,
		};
		let ok = self.load_walk(&cache.text, cache.sep, &cache.section, opts)?;
		self.preset_status = PresetStatus::Loaded;
		Ok(ok)
	}

	/// Like [`reload_presets`](Self::reload_presets) but leaves properties
	/// already touched by a non-preset source alone; those take precedence.
	pub fn update_presets(&mut self) -> Result<bool> {
		let Some(cache) = self.preset_cache.clone() else {
			return Ok(false);
		};
		self.preset_status = PresetStatus::Loading;
		let opts = CommitOpts {
			source: Source::PROJECT,
			checked: true,
			preset_replay: true,
			skip_non_preset: true,
		};
		let ok = self.load_walk(&cache.text, cache.sep, &cache.section, opts)?;
		self.preset_status = PresetStatus::Loaded;
		Ok(ok)
	}

	pub fn preset_status(&self) -> PresetStatus {
		self.preset_status
	}

	pub fn preset_modification(&self) -> PresetModification {
		self.modified_presets
	}

	// -- store -------------------------------------------------------------

	/// Serializes selected properties as `key<sep>value` lines in
	/// declaration order, wrapped in a `[section]` header when non-empty.
	pub fn store(&self, out: &mut String, sep: char, section: &str, flags: StoreFlags) {
		if !section.is_empty() {
			let _ = writeln!(out, "[{section}]");
		}
		for prop in &self.props {
			if !self.should_store(prop, flags) {
				continue;
			}
			if flags.contains(StoreFlags::DESCRIPTION) && !prop.desc().is_empty() {
				let _ = writeln!(out, "# {}", prop.desc());
			}
			let _ = writeln!(out, "{}{sep}{}", prop.name(), prop.encode());
		}
		if !flags.contains(StoreFlags::REGISTERED_ONLY) {
			for (key, val) in &self.unknown {
				let _ = writeln!(out, "{key}{sep}{val}");
			}
		}
	}

	pub fn store_file(
		&self,
		path: impl AsRef<Path>,
		sep: char,
		section: &str,
		flags: StoreFlags,
	) -> Result<()> {
		let mut out = String::new();
		self.store(&mut out, sep, section, flags);
		let path = path.as_ref();
		std::fs::write(path, out).map_err(|error| PropError::Io {
			path: path.to_path_buf(),
			error,
		})
	}

	fn should_store(&self, prop: &Property, flags: StoreFlags) -> bool {
		let f = prop.flags();
		if f.contains(PropertyFlags::FORBIDDEN) || f.contains(PropertyFlags::META) {
			return false;
		}
		if f.contains(PropertyFlags::CHECKSUM) && !flags.contains(StoreFlags::CHECKSUM) {
			return false;
		}
		if flags.contains(StoreFlags::PRESETS_ONLY) && !prop.loaded().contains(Source::PROJECT) {
			return false;
		}
		if f.contains(PropertyFlags::VOLATILE) {
			return flags.contains(StoreFlags::NON_PERSISTENT);
		}
		if flags.contains(StoreFlags::ALL_PERSISTENT) {
			return f.contains(PropertyFlags::PERSISTENT);
		}
		if f.contains(PropertyFlags::ALWAYS) || f.contains(PropertyFlags::VISIBLE) {
			return true;
		}
		if f.contains(PropertyFlags::HIDDEN) {
			return !prop.loaded().is_empty() || prop.is_modified();
		}
		f.contains(PropertyFlags::PERSISTENT)
	}

	// -- validation passes -------------------------------------------------

	/// Checks that every mandatory property has been supplied by some
	/// source; missing ones are named in the aggregate message.
	pub fn validate_mandatory(&self, error: &mut String) -> bool {
		let missing: Vec<&str> = self
			.props
			.iter()
			.filter(|p| p.is_mandatory() && p.loaded().is_empty())
			.map(|p| p.name())
			.collect();
		if missing.is_empty() {
			return true;
		}
		let _ = write!(
			error,
			"mandatory properties not supplied: {}",
			missing.join(", ")
		);
		false
	}

	/// CRC32 per checksum-covered property, over `name=value`, in
	/// declaration order.
	pub fn checksums(&self) -> Vec<u32> {
		self.props
			.iter()
			.filter(|p| p.flags().contains(PropertyFlags::CHECKSUM))
			.map(|p| {
				let mut hasher = crc32fast::Hasher::new();
				hasher.update(format!("{}={}", p.name(), p.encode()).as_bytes());
				hasher.finalize()
			})
			.collect()
	}

	/// Compares current checksums against a caller-supplied expectation.
	pub fn validate_checksum(&self, error: &mut String, expected: &[u32]) -> bool {
		let covered: Vec<&Property> = self
			.props
			.iter()
			.filter(|p| p.flags().contains(PropertyFlags::CHECKSUM))
			.collect();
		if covered.len() != expected.len() {
			let _ = write!(
				error,
				"checksum count mismatch: {} covered properties, {} expected values",
				covered.len(),
				expected.len()
			);
			return false;
		}
		for (prop, &want) in covered.iter().zip(expected) {
			let mut hasher = crc32fast::Hasher::new();
			hasher.update(format!("{}={}", prop.name(), prop.encode()).as_bytes());
			let got = hasher.finalize();
			if got != want {
				let _ = write!(error, "checksum mismatch on {}", prop.name());
				return false;
			}
		}
		true
	}

	/// Verifies every property that carries a verifier. Returns `false` on
	/// the first failure when `stop_on_first`, otherwise after checking all.
	pub fn verify_all(&self, stop_on_first: bool) -> bool {
		let mut ok = true;
		for prop in &self.props {
			if !prop.verify_if_required() {
				if self.verbosity() > 0 {
					warn!(key = prop.name(), "verification failed");
				}
				ok = false;
				if stop_on_first {
					return false;
				}
			}
		}
		ok
	}

	pub fn deactivate_verification(&self) {
		for prop in &self.props {
			prop.deactivate_verification();
		}
	}

	// -- bookkeeping accessors ---------------------------------------------

	pub fn is_modified(&self, name: &str) -> bool {
		self.find(name).is_some_and(|p| p.is_modified())
	}

	/// Names of all modified properties, in declaration order.
	pub fn modified(&self) -> Vec<&str> {
		self.props
			.iter()
			.filter(|p| p.is_modified())
			.map(|p| p.name())
			.collect()
	}

	/// Value held just before the most recent modification of `name`.
	pub fn previous_value(&self, name: &str) -> Option<&str> {
		self.modified_map.get(name).map(String::as_str)
	}

	pub fn clear_modified(&mut self) {
		for prop in &mut self.props {
			prop.modified = false;
		}
		self.modified_map.clear();
	}

	pub fn rejected_fields(&self) -> &[RejectedField] {
		&self.rejected
	}

	pub fn unknown_fields(&self) -> &[(String, String)] {
		&self.unknown
	}

	pub fn clear_diagnostics(&mut self) {
		self.rejected.clear();
		self.unknown.clear();
	}

	/// Aggregate OR of all sources that have contributed any value.
	pub fn loaded(&self) -> Source {
		self.loaded
	}

	/// Whether the most recent section-filtered load saw its section.
	pub fn last_section_found(&self) -> bool {
		self.section_found
	}

	pub fn reset_section_found(&mut self) {
		self.section_found = false;
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn set_name(&mut self, name: impl Into<String>) {
		self.name = name.into();
	}

	pub fn file_name(&self) -> &str {
		&self.file_name
	}

	pub fn preset_name(&self) -> &str {
		&self.preset_name
	}

	pub fn default_separator(&self) -> char {
		self.default_separator
	}

	pub fn set_default_separator(&mut self, sep: char) {
		self.default_separator = sep;
	}

	pub fn meta(&self) -> Option<&MetaProperties> {
		self.meta.as_deref()
	}

	pub fn meta_mut(&mut self) -> Option<&mut MetaProperties> {
		self.meta.as_deref_mut()
	}

	pub fn set_hooks(&mut self, hooks: Box<dyn RegistryHooks + Send>) {
		self.hooks = Some(hooks);
	}

	/// Narration level from the meta sub-registry; 0 is silent.
	pub fn verbosity(&self) -> u32 {
		self.meta.as_ref().map(|m| m.verbosity()).unwrap_or(0)
	}

	pub fn set_verbosity(&mut self, level: u32) {
		if let Some(meta) = self.meta.as_deref_mut() {
			meta.set_verbosity(level);
		}
	}

	fn unknown_policy(&self) -> UnknownFieldPolicy {
		self.meta
			.as_ref()
			.map(|m| m.unknown_field_policy())
			.unwrap_or(UnknownFieldPolicy::Ignore)
	}

	fn duplicate_policy(&self) -> DuplicateSectionPolicy {
		self.meta
			.as_ref()
			.map(|m| m.duplicate_section_policy())
			.unwrap_or(DuplicateSectionPolicy::Merge)
	}

	// -- commit machinery --------------------------------------------------

	fn load_walk(&mut self, text: &str, sep: char, section: &str, opts: CommitOpts) -> Result<bool> {
		let filter_active = !section.is_empty();
		if filter_active {
			self.section_found = false;
		}
		let mut current = String::new();
		let mut seen: Vec<String> = Vec::new();
		let mut skipping = false;
		let mut success = true;
		for raw in text.lines() {
			let line = raw.trim();
			if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
				continue;
			}
			if let Some(header) = line.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
				let header = header.trim();
				skipping = false;
				if seen.iter().any(|s| s == header) {
					match self.duplicate_policy() {
						DuplicateSectionPolicy::Merge => {}
						DuplicateSectionPolicy::First => skipping = true,
						DuplicateSectionPolicy::Abort => {
							return Err(PropError::Aborted(format!("duplicate section [{header}]")));
						}
					}
				} else {
					seen.push(header.to_string());
				}
				current = header.to_string();
				if filter_active && current == section {
					self.section_found = true;
				}
				continue;
			}
			if skipping || (filter_active && current != section) {
				continue;
			}
			let Some((key, val)) = line.split_once(sep) else {
				if self.verbosity() > 0 {
					warn!(line, "line has no separator");
				}
				self.rejected.push(RejectedField {
					key: line.to_string(),
					value: String::new(),
					reason: "missing separator".to_string(),
				});
				success = false;
				continue;
			};
			if self.commit_pair(key.trim(), val.trim(), opts)? == CommitOutcome::Rejected {
				success = false;
			}
		}
		self.finish_load();
		Ok(success)
	}

	fn finish_load(&mut self) {
		if let Some(h) = self.hooks.as_mut() {
			h.on_loaded();
			h.post_loaded();
		}
	}

	/// The canonical commit algorithm every load path goes through.
	fn commit_pair(&mut self, key: &str, val: &str, opts: CommitOpts) -> Result<CommitOutcome> {
		let Some(&slot) = self.index.get(key) else {
			return self.note_unknown(key, val);
		};
		if opts.skip_non_preset && self.props[slot].loaded.intersects(Source::NON_PRESET) {
			return Ok(CommitOutcome::Skipped);
		}
		let preset_seen = self.props[slot].loaded.contains(Source::PROJECT);
		let from_preset = opts.source.contains(Source::PROJECT);
		if opts.checked {
			let verdict = if self.props[slot].flags.contains(PropertyFlags::FORBIDDEN) {
				Err(format!("can't set {key}: assignment is forbidden"))
			} else {
				self.props[slot].validate(val, self)
			};
			if let Err(reason) = verdict {
				if self.verbosity() > 0 {
					warn!(key, value = val, reason = %reason, "value rejected");
				}
				if preset_seen && !from_preset {
					self.modified_presets = PresetModification::ModifiedFailed;
					self.props[slot].loaded |= Source::PRESETS_MODIFIED_FAILED;
				}
				self.rejected.push(RejectedField {
					key: key.to_string(),
					value: val.to_string(),
					reason: reason.clone(),
				});
				if let Some(h) = self.hooks.as_mut() {
					h.on_rejected(key, val, &reason);
				}
				return Ok(CommitOutcome::Rejected);
			}
			if self.props[slot].flags.contains(PropertyFlags::DEPRECATED) && self.verbosity() > 0 {
				warn!(key, "assignment to deprecated property");
			}
		}
		let prev = self.props[slot].cell.encode();
		self.props[slot].cell.sync(val);
		let text = self.props[slot].cell.encode();
		let changed = text != prev;
		self.props[slot].loaded |= opts.source;
		self.loaded |= opts.source;
		self.map.insert(key.to_string(), text.clone());
		if changed {
			self.props[slot].modified = true;
			self.modified_map.insert(key.to_string(), prev);
			if preset_seen {
				if from_preset {
					if opts.preset_replay {
						self.props[slot].loaded |= Source::PRESETS_OVERWRITTEN;
					}
				} else {
					if self.modified_presets == PresetModification::None {
						self.modified_presets = PresetModification::Modified;
					}
					self.props[slot].loaded |= Source::PRESETS_MODIFIED;
				}
			}
			if let Some(h) = self.hooks.as_mut() {
				h.on_modified(key, &text);
			}
		}
		Ok(CommitOutcome::Committed)
	}

	fn note_unknown(&mut self, key: &str, val: &str) -> Result<CommitOutcome> {
		match self.unknown_policy() {
			UnknownFieldPolicy::Ignore => {}
			UnknownFieldPolicy::Warn => {
				if self.verbosity() > 0 {
					match self.nearest_name(key) {
						Some(suggestion) => warn!(key, suggestion, "unknown property"),
						None => warn!(key, "unknown property"),
					}
				}
			}
			UnknownFieldPolicy::Abort => {
				return Err(PropError::Aborted(format!("unknown property '{key}'")));
			}
		}
		self.unknown.push((key.to_string(), val.to_string()));
		Ok(CommitOutcome::Unknown)
	}

	/// Closest registered name within edit distance 3, for typo hints.
	fn nearest_name(&self, key: &str) -> Option<&str> {
		self.props
			.iter()
			.map(|p| (strsim::levenshtein(p.name(), key), p.name()))
			.filter(|&(dist, _)| dist <= 3)
			.min_by_key(|&(dist, _)| dist)
			.map(|(_, name)| name)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::validators::{RangeValidator, ValidatorRef};

	fn net_registry() -> (Properties, PropKey<i32>, PropKey<String>) {
		let mut reg = Properties::new("net");
		let retries = reg.define(
			PropertyDef::new("retries", 1i32)
				.desc("connection retry count")
				.validator(ValidatorRef::owned(RangeValidator::bounds(0i32, 5))),
		);
		let host = reg.define(PropertyDef::new("host", "localhost".to_string()));
		(reg, retries, host)
	}

	#[test]
	fn test_define_returns_typed_handles() {
		let (reg, retries, host) = net_registry();
		assert_eq!(reg.value(retries), 1);
		assert_eq!(reg.value(host), "localhost");
		assert_eq!(reg.raw("retries"), Some("1"));
	}

	#[test]
	fn test_duplicate_registration_keeps_first() {
		let (mut reg, retries, _) = net_registry();
		let again = reg.define(PropertyDef::new("retries", 99i32));
		assert_eq!(again.slot, retries.slot);
		assert_eq!(reg.value(retries), 1);
		assert_eq!(reg.len(), 2);
	}

	#[test]
	fn test_set_validates() {
		let (mut reg, retries, _) = net_registry();
		assert!(reg.set(retries, 4));
		assert_eq!(reg.value(retries), 4);
		assert!(!reg.set(retries, 9));
		assert_eq!(reg.value(retries), 4);
		assert_eq!(reg.rejected_fields().len(), 1);
		assert!(reg.loaded().contains(Source::USER));
	}

	#[test]
	fn test_load_unchecked_bypasses_validator() {
		let (mut reg, retries, _) = net_registry();
		assert!(reg.load_unchecked("retries", "9"));
		assert_eq!(reg.value(retries), 9);
		assert!(reg.rejected_fields().is_empty());
	}

	#[test]
	fn test_modified_tracks_diff_and_previous_value() {
		let (mut reg, retries, _) = net_registry();
		assert!(reg.set(retries, 1), "same value commits");
		assert!(!reg.is_modified("retries"), "no diff, no modification");
		assert!(reg.set(retries, 2));
		assert!(reg.is_modified("retries"));
		assert_eq!(reg.previous_value("retries"), Some("1"));
		reg.clear_modified();
		assert!(reg.modified().is_empty());
	}

	#[test]
	fn test_forbidden_rejects_assignment() {
		let mut reg = Properties::new("sys");
		reg.define(
			PropertyDef::new("build", "release".to_string())
				.flags(PropertyFlags::DEFAULT | PropertyFlags::FORBIDDEN),
		);
		assert!(!reg.set_property("build", "debug"));
		assert_eq!(reg.raw("build"), Some("release"));
	}

	#[test]
	fn test_get_as_decodes_over_default() {
		let (mut reg, _, _) = net_registry();
		assert!(reg.set_property("retries", "3"));
		assert_eq!(reg.get_as::<i64>("retries"), 3);
		assert_eq!(reg.get_as::<i64>("missing"), 0);
	}

	#[test]
	fn test_sync_replays_mirror() {
		let (mut reg, retries, _) = net_registry();
		assert!(reg.set(retries, 5));
		reg.sync();
		assert_eq!(reg.value(retries), 5);
	}

	#[test]
	fn test_nearest_name_suggestion_window() {
		let (reg, _, _) = net_registry();
		assert_eq!(reg.nearest_name("retrys"), Some("retries"));
		assert_eq!(reg.nearest_name("completely_different"), None);
	}
}
