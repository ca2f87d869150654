//! Shared enumeration dictionary: a process-wide, swappable, optionally
//! frozen bidirectional mapping between integer codes and names.
//!
//! One dictionary instance backs every enumeration-typed property of a kind,
//! across possibly many registries. It is installed once into an
//! [`EnumSlot`] with a compare-and-swap, so concurrent first-time
//! initializers race safely: exactly one candidate wins, the rest are
//! dropped by their constructing thread.

use std::collections::BTreeMap;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use parking_lot::RwLock;

use crate::codec::Codec;

/// Shared installation slot for a process-wide dictionary.
pub type EnumSlot = ArcSwapOption<EnumDictionary>;

#[derive(Default)]
struct DictState {
	/// Snapshot of the initial mapping, for `reset`.
	start: BTreeMap<i32, String>,
	by_code: BTreeMap<i32, String>,
	by_name: BTreeMap<String, i32>,
	frozen: bool,
}

impl DictState {
	fn insert(&mut self, code: i32, name: &str) {
		self.by_code.insert(code, name.to_string());
		self.by_name.insert(name.to_string(), code);
	}
}

/// Bidirectional code ↔ name table backing enumeration-typed properties.
///
/// The two maps are always inverse of one another. Lookups that miss return
/// the [`INVALID_CODE`](Self::INVALID_CODE) /
/// [`INVALID_NAME`](Self::INVALID_NAME) sentinels, which never collide with
/// a real mapping.
pub struct EnumDictionary {
	inner: RwLock<DictState>,
}

impl EnumDictionary {
	/// Sentinel code for "no such entry".
	pub const INVALID_CODE: i32 = i32::MAX;
	/// Sentinel name for "no such entry".
	pub const INVALID_NAME: &'static str = "";

	/// Builds a dictionary from `mapping`, snapshotting it for `reset`.
	pub fn new(mapping: &[(i32, &str)], freeze: bool) -> Self {
		let mut state = DictState {
			frozen: freeze,
			..DictState::default()
		};
		for &(code, name) in mapping {
			state.insert(code, name);
			state.start.insert(code, name.to_string());
		}
		Self {
			inner: RwLock::new(state),
		}
	}

	/// Builds a new dictionary and attempts to install it into `slot`.
	///
	/// If another installation already won the race, the fresh candidate is
	/// discarded and the winner is returned; losing is silent and expected.
	pub fn install(slot: &EnumSlot, mapping: &[(i32, &str)], freeze: bool) -> Arc<EnumDictionary> {
		let fresh = Arc::new(Self::new(mapping, freeze));
		let prev = slot.compare_and_swap(std::ptr::null::<EnumDictionary>(), Some(fresh.clone()));
		match &*prev {
			Some(existing) => existing.clone(),
			None => fresh,
		}
	}

	/// Inserts codes not already present; first writer for a code wins.
	///
	/// No-op once frozen. When `freeze` is set, the dictionary freezes after
	/// the insertion; freezing is monotonic until `reset`.
	pub fn append(&self, mapping: &[(i32, &str)], freeze: bool) {
		let mut state = self.inner.write();
		if state.frozen {
			return;
		}
		state.frozen = freeze;
		for &(code, name) in mapping {
			if !state.by_code.contains_key(&code) {
				state.insert(code, name);
			}
		}
	}

	/// Unfreezes and restores the mapping snapshotted at construction.
	pub fn reset(&self) {
		let mut state = self.inner.write();
		state.frozen = false;
		state.by_code.clear();
		state.by_name.clear();
		let start = state.start.clone();
		for (code, name) in &start {
			state.insert(*code, name);
		}
	}

	pub fn is_frozen(&self) -> bool {
		self.inner.read().frozen
	}

	/// Name mapped to `code`, or [`Self::INVALID_NAME`].
	pub fn name_of(&self, code: i32) -> String {
		self.inner
			.read()
			.by_code
			.get(&code)
			.cloned()
			.unwrap_or_else(|| Self::INVALID_NAME.to_string())
	}

	/// Code mapped to `name`, or [`Self::INVALID_CODE`].
	pub fn code_of(&self, name: &str) -> i32 {
		self.inner
			.read()
			.by_name
			.get(name)
			.copied()
			.unwrap_or(Self::INVALID_CODE)
	}

	/// Snapshot of all names, in map order.
	pub fn names(&self) -> Vec<String> {
		self.inner.read().by_code.values().cloned().collect()
	}

	/// Snapshot of all codes, in map order.
	pub fn codes(&self) -> Vec<i32> {
		self.inner.read().by_code.keys().copied().collect()
	}
}

/// Enumeration value cell: an integer code bound to a shared dictionary.
///
/// Ordering and equality compare codes only; the dictionary identity is
/// irrelevant for comparison.
#[derive(Clone)]
pub struct EnumValue {
	code: i32,
	dict: Arc<EnumDictionary>,
}

impl EnumValue {
	pub fn new(code: i32, dict: Arc<EnumDictionary>) -> Self {
		Self { code, dict }
	}

	pub fn code(&self) -> i32 {
		self.code
	}

	/// Current name, or the invalid-name sentinel for an unmapped code.
	pub fn name(&self) -> String {
		self.dict.name_of(self.code)
	}

	pub fn dictionary(&self) -> &Arc<EnumDictionary> {
		&self.dict
	}
}

impl std::fmt::Debug for EnumValue {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("EnumValue").field("code", &self.code).finish()
	}
}

impl PartialEq for EnumValue {
	fn eq(&self, other: &Self) -> bool {
		self.code == other.code
	}
}

impl Eq for EnumValue {}

impl PartialOrd for EnumValue {
	fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
		Some(self.cmp(other))
	}
}

impl Ord for EnumValue {
	fn cmp(&self, other: &Self) -> std::cmp::Ordering {
		self.code.cmp(&other.code)
	}
}

impl Codec for EnumValue {
	/// Dictionary lookup by name; a miss stores the invalid code so the
	/// mismatch stays visible downstream.
	fn decode(&mut self, text: &str) {
		let code = self.dict.code_of(text);
		if code == EnumDictionary::INVALID_CODE {
			tracing::warn!(value = text, "no matching enumeration for name");
		}
		self.code = code;
	}

	fn encode(&self) -> String {
		let name = self.dict.name_of(self.code);
		if name == EnumDictionary::INVALID_NAME {
			tracing::warn!(code = self.code, "no matching enumeration for code");
		}
		name
	}

	fn type_tag() -> &'static str {
		"enum"
	}
}
