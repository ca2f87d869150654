//! Pluggable accept/reject rules for textual property values.
//!
//! Validators run before any state mutation: they judge the raw candidate
//! text, never a decoded value, so a rejection leaves the stored value
//! untouched. Each returns a human-readable reason on rejection.

use std::fmt::Display;
use std::marker::PhantomData;
use std::str::FromStr;
use std::sync::Arc;

use crate::codec::{Codec, clean_integer_text};
use crate::enumdict::EnumDictionary;
use crate::properties::Properties;

/// Accept/reject rule for a property's textual value.
///
/// A validator is a read-only arbiter: it may inspect the owning registry
/// but must not mutate it.
pub trait Validator: Send + Sync {
	fn validate(&self, key: &str, val: &str, container: &Properties) -> Result<(), String>;

	/// The legal values, if finitely enumerable: `(items, count)` with a
	/// negative count meaning "unbounded".
	fn possible_values(&self) -> Option<(Vec<String>, i32)> {
		None
	}
}

/// Validator attachment: exclusively owned by the property, or borrowed
/// from a longer-lived holder.
pub enum ValidatorRef {
	Owned(Box<dyn Validator>),
	Borrowed(&'static dyn Validator),
}

impl ValidatorRef {
	pub fn owned(validator: impl Validator + 'static) -> Self {
		Self::Owned(Box::new(validator))
	}

	pub fn borrowed(validator: &'static dyn Validator) -> Self {
		Self::Borrowed(validator)
	}

	pub fn get(&self) -> &dyn Validator {
		match self {
			Self::Owned(v) => &**v,
			Self::Borrowed(v) => *v,
		}
	}
}

fn has_alpha(text: &str) -> bool {
	text.bytes().any(|b| b.is_ascii_alphabetic())
}

/// True iff the only alphabetic character is a single `e`/`E` immediately
/// followed by `+` or `-` (a float exponent marker).
fn exponent_marker_only(text: &str) -> bool {
	let bytes = text.as_bytes();
	let mut found = false;
	for (i, &b) in bytes.iter().enumerate() {
		if b.is_ascii_alphabetic() {
			if found {
				return false;
			}
			if (b == b'e' || b == b'E') && matches!(bytes.get(i + 1), Some(b'+') | Some(b'-')) {
				found = true;
			} else {
				return false;
			}
		}
	}
	found
}

/// Splits a `{a, b, c}` or bare comma list into items plus a display form.
fn parse_item_list(range: &str) -> (Vec<String>, String) {
	let inner = range.trim();
	let inner = inner
		.strip_prefix('{')
		.and_then(|s| s.strip_suffix('}'))
		.unwrap_or(inner);
	let items: Vec<String> = inner
		.split(',')
		.map(|s| s.trim().to_string())
		.filter(|s| !s.is_empty())
		.collect();
	let pretty = format!("{{{}}}", items.join(", "));
	(items, pretty)
}

/// Whether range pairs may overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overlap {
	Allow,
	Reject,
}

/// Numeric type signedness for width-bound checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signedness {
	Signed,
	Unsigned,
}

/// Parses `a..b,c` range syntax: comma-separated segments, each either a
/// two-dot pair or a single value standing for itself.
pub fn parse_range<T>(text: &str, overlap: Overlap) -> Result<Vec<(T, T)>, String>
where
	T: FromStr + PartialOrd + Copy,
{
	let mut pairs = Vec::new();
	for seg in text.split(',') {
		let seg = seg.trim();
		if seg.is_empty() {
			return Err("empty range segment".to_string());
		}
		let (a, b) = match seg.split_once("..") {
			Some((lo, hi)) => (lo.trim(), hi.trim()),
			None => (seg, seg),
		};
		let lo: T = a.parse().map_err(|_| format!("bad range bound '{a}'"))?;
		let hi: T = b.parse().map_err(|_| format!("bad range bound '{b}'"))?;
		if hi < lo {
			return Err(format!("inverted range '{seg}'"));
		}
		pairs.push((lo, hi));
	}
	if overlap == Overlap::Reject {
		for i in 0..pairs.len() {
			for j in (i + 1)..pairs.len() {
				if pairs[i].0 <= pairs[j].1 && pairs[j].0 <= pairs[i].1 {
					return Err("overlapping range pairs".to_string());
				}
			}
		}
	}
	Ok(pairs)
}

/// Accepts values inside a set of inclusive ranges.
///
/// Rejects stray alphabetics (exponent markers excepted) and empty input
/// before parsing, then re-applies the type's default numeric validator so
/// a float literal aimed at an integer field is still caught.
pub struct RangeValidator<T> {
	pairs: Vec<(T, T)>,
	pretty: String,
}

impl<T> RangeValidator<T>
where
	T: Codec + FromStr + PartialOrd + Copy + Display,
{
	pub fn from_range_str(range: &str, overlap: Overlap) -> Result<Self, String> {
		Ok(Self {
			pairs: parse_range(range, overlap)?,
			pretty: range.to_string(),
		})
	}

	/// Single inclusive `min..max` pair.
	pub fn bounds(min: T, max: T) -> Self {
		debug_assert!(max >= min);
		Self {
			pairs: vec![(min, max)],
			pretty: format!("{min}..{max}"),
		}
	}

	fn in_range(&self, v: T) -> bool {
		self.pairs.iter().any(|&(lo, hi)| lo <= v && v <= hi)
	}
}

impl<T> Validator for RangeValidator<T>
where
	T: Codec + FromStr + PartialOrd + Copy + Display,
{
	fn validate(&self, key: &str, val: &str, container: &Properties) -> Result<(), String> {
		if has_alpha(val) && !exponent_marker_only(val) {
			return Err(format!(
				"can't set {key} to {val}: value contains illegal alphabetic characters"
			));
		}
		if val.is_empty() {
			return Err(format!("can't set {key} to an empty value"));
		}
		let v: T = val
			.parse()
			.or_else(|_| clean_integer_text(val).parse())
			.map_err(|_| format!("can't set {key} to {val}: not a valid {}", T::type_tag()))?;
		if !self.in_range(v) {
			return Err(format!(
				"can't set {key} to {val}: value must be within the range {}",
				self.pretty
			));
		}
		match T::default_validator() {
			Some(default) => default.get().validate(key, val, container),
			None => Ok(()),
		}
	}
}

/// Range validator over `i32`, the common case.
pub type IntValidator = RangeValidator<i32>;

/// Accepts numerals that fit the target type's byte width.
///
/// Hex (`0x` prefix) is allowed; a fractional tail is allowed only when it
/// is all zeros. Widths of 1, 2 and 4 bytes enforce the documented maxima;
/// wider types only have to parse.
pub struct NumericValidator<T> {
	signedness: Signedness,
	_marker: PhantomData<fn() -> T>,
}

impl<T> NumericValidator<T> {
	pub fn new(signedness: Signedness) -> Self {
		Self {
			signedness,
			_marker: PhantomData,
		}
	}
}

impl<T: Send + Sync + 'static> Validator for NumericValidator<T> {
	fn validate(&self, key: &str, val: &str, _container: &Properties) -> Result<(), String> {
		if val.is_empty() {
			return Err(format!("can't set {key} to an empty value"));
		}
		let bytes = val.as_bytes();
		let is_hex = bytes.len() > 2 && bytes[0] == b'0' && (bytes[1] == b'x' || bytes[1] == b'X');
		let mut numeric = true;
		let mut fractional = false;
		for &b in &bytes[if is_hex { 2 } else { 0 }..] {
			if is_hex {
				if !b.is_ascii_hexdigit() {
					numeric = false;
					break;
				}
			} else if b.is_ascii_alphabetic() {
				numeric = false;
				break;
			} else if fractional && b != b'0' {
				numeric = false;
				break;
			} else if b == b'.' {
				fractional = true;
			}
		}
		if !numeric {
			return Err(format!(
				"can't set {key} to {val}: must be a non-decimal number without alphabetic characters"
			));
		}
		let parsed = if is_hex {
			i128::from_str_radix(&val[2..], 16)
		} else {
			clean_integer_text(val).parse::<i128>()
		};
		let Ok(big) = parsed else {
			return Err(format!("can't set {key} to {val}: not a valid number"));
		};
		let width = std::mem::size_of::<T>();
		let limit: Option<i128> = match (width, self.signedness) {
			(1, Signedness::Signed) => Some(127),
			(1, Signedness::Unsigned) => Some(255),
			(2, Signedness::Signed) => Some(32_767),
			(2, Signedness::Unsigned) => Some(65_535),
			(4, Signedness::Signed) => Some(2_147_483_647),
			(4, Signedness::Unsigned) => Some(4_294_967_295),
			_ => None,
		};
		if let Some(limit) = limit
			&& big > limit
		{
			let kind = match self.signedness {
				Signedness::Signed => "signed",
				Signedness::Unsigned => "unsigned",
			};
			return Err(format!(
				"can't set {key} to {val}: a {width}-byte {kind} value cannot exceed {limit}"
			));
		}
		Ok(())
	}
}

/// Accepts only members of a finite literal set.
pub struct FiniteRangeValidator {
	items: Vec<String>,
	pretty: String,
	permissive: bool,
}

impl FiniteRangeValidator {
	/// Builds from a `{a, b}` or bare comma list.
	pub fn new(range: &str) -> Self {
		let (items, pretty) = parse_item_list(range);
		Self {
			items,
			pretty,
			permissive: false,
		}
	}

	/// A validator that accepts everything but still reports as discrete.
	pub fn permissive() -> Self {
		Self {
			items: Vec::new(),
			pretty: "{}".to_string(),
			permissive: true,
		}
	}
}

impl Validator for FiniteRangeValidator {
	fn validate(&self, key: &str, val: &str, _container: &Properties) -> Result<(), String> {
		if self.permissive || self.items.iter().any(|i| i == val) {
			Ok(())
		} else {
			Err(format!(
				"can't set {key} to {val}: value must be in the range of {}",
				self.pretty
			))
		}
	}

	fn possible_values(&self) -> Option<(Vec<String>, i32)> {
		let count = if self.permissive { -1 } else { self.items.len() as i32 };
		Some((self.items.clone(), count))
	}
}

/// Accepts only an exact set of names.
pub struct ExactNamesValidator {
	items: Vec<String>,
	pretty: String,
}

impl ExactNamesValidator {
	pub fn new(names: &[&str]) -> Self {
		let items: Vec<String> = names.iter().map(|s| s.to_string()).collect();
		let pretty = format!("<{}>", items.join(" "));
		Self { items, pretty }
	}
}

impl Validator for ExactNamesValidator {
	fn validate(&self, key: &str, val: &str, _container: &Properties) -> Result<(), String> {
		if self.items.iter().any(|i| i == val) {
			Ok(())
		} else {
			Err(format!(
				"can't set {key} to {val}: value must be in the range of {}",
				self.pretty
			))
		}
	}

	fn possible_values(&self) -> Option<(Vec<String>, i32)> {
		Some((self.items.clone(), self.items.len() as i32))
	}
}

/// Accepts file names from a literal set; `*` or `...` in the set accepts
/// any file.
pub struct FileValidator {
	items: Vec<String>,
	pretty: String,
	all_files: bool,
}

impl FileValidator {
	pub fn new(range: &str) -> Self {
		let (items, pretty) = parse_item_list(range);
		let all_files = items.iter().any(|i| i.contains('*') || i == "...");
		Self {
			items,
			pretty,
			all_files,
		}
	}
}

impl Validator for FileValidator {
	fn validate(&self, key: &str, val: &str, _container: &Properties) -> Result<(), String> {
		if self.all_files || self.items.iter().any(|i| i == val) {
			Ok(())
		} else {
			Err(format!(
				"can't set {key} to {val}: value must be in the range of {}",
				self.pretty
			))
		}
	}

	fn possible_values(&self) -> Option<(Vec<String>, i32)> {
		let count = if self.all_files { -1 } else { self.items.len() as i32 };
		Some((self.items.clone(), count))
	}
}

/// Directory variant of [`FileValidator`]; identical acceptance rules.
pub struct DirectoryValidator {
	inner: FileValidator,
}

impl DirectoryValidator {
	pub fn new(range: &str) -> Self {
		Self {
			inner: FileValidator::new(range),
		}
	}
}

impl Validator for DirectoryValidator {
	fn validate(&self, key: &str, val: &str, container: &Properties) -> Result<(), String> {
		self.inner.validate(key, val, container)
	}

	fn possible_values(&self) -> Option<(Vec<String>, i32)> {
		self.inner.possible_values()
	}
}

/// Membership in a shared enumeration dictionary.
///
/// Open world until the dictionary freezes: an unfrozen dictionary accepts
/// anything, so registration order doesn't matter during startup.
pub struct EnumerationValidator {
	dict: Arc<EnumDictionary>,
}

impl EnumerationValidator {
	pub fn new(dict: Arc<EnumDictionary>) -> Self {
		Self { dict }
	}
}

impl Validator for EnumerationValidator {
	fn validate(&self, key: &str, val: &str, _container: &Properties) -> Result<(), String> {
		if !self.dict.is_frozen() {
			return Ok(());
		}
		if self.dict.code_of(val) != EnumDictionary::INVALID_CODE {
			Ok(())
		} else {
			Err(format!(
				"can't set {key} to {val}: value must be in the range of {{{}}}",
				self.dict.names().join(", ")
			))
		}
	}

	fn possible_values(&self) -> Option<(Vec<String>, i32)> {
		let names = self.dict.names();
		let count = names.len() as i32;
		Some((names, count))
	}
}

/// Accepts exactly one of a configurable positive/negative literal pair.
pub struct BooleanValidator {
	positive: String,
	negative: String,
}

impl BooleanValidator {
	pub fn new(positive: &str, negative: &str) -> Self {
		Self {
			positive: positive.to_string(),
			negative: negative.to_string(),
		}
	}

	/// The common `true`/`false` pair.
	pub fn true_false() -> Self {
		Self::new("true", "false")
	}
}

impl Validator for BooleanValidator {
	fn validate(&self, key: &str, val: &str, _container: &Properties) -> Result<(), String> {
		if val == self.positive || val == self.negative {
			Ok(())
		} else {
			Err(format!(
				"can't set {key} to {val}: value must be {} or {}",
				self.positive, self.negative
			))
		}
	}

	fn possible_values(&self) -> Option<(Vec<String>, i32)> {
		Some((vec![self.positive.clone(), self.negative.clone()], 2))
	}
}

/// Accepts exactly one character.
pub struct CharacterValidator;

impl Validator for CharacterValidator {
	fn validate(&self, key: &str, val: &str, _container: &Properties) -> Result<(), String> {
		if val.chars().count() == 1 {
			Ok(())
		} else {
			Err(format!(
				"can't set {key} to {val}: value must be 1 character long"
			))
		}
	}
}

/// Accepts `"0"` or an even count of hex digits (whole bytes).
pub struct HexStringValidator;

impl Validator for HexStringValidator {
	fn validate(&self, key: &str, val: &str, _container: &Properties) -> Result<(), String> {
		if val == "0" {
			return Ok(());
		}
		if val.len() % 2 != 0 {
			return Err(format!(
				"can't set {key} to {val}: value is not a valid hex string (not whole bytes)"
			));
		}
		if !val.bytes().all(|b| b.is_ascii_hexdigit()) {
			return Err(format!(
				"can't set {key} to {val}: value is not a valid hex string"
			));
		}
		Ok(())
	}
}

/// Accepts everything; useful to mark a field as intentionally free-form.
pub struct AlwaysTrueValidator;

impl Validator for AlwaysTrueValidator {
	fn validate(&self, _key: &str, _val: &str, _container: &Properties) -> Result<(), String> {
		Ok(())
	}

	fn possible_values(&self) -> Option<(Vec<String>, i32)> {
		Some((Vec::new(), -1))
	}
}

/// Validates range-expression syntax itself (`3..7,13`), for properties
/// whose value is a range. An empty value means "unused" and passes.
pub struct RangeSyntaxValidator<T> {
	_marker: PhantomData<fn() -> T>,
}

impl<T> RangeSyntaxValidator<T> {
	pub fn new() -> Self {
		Self {
			_marker: PhantomData,
		}
	}
}

impl<T> Default for RangeSyntaxValidator<T> {
	fn default() -> Self {
		Self::new()
	}
}

impl<T> Validator for RangeSyntaxValidator<T>
where
	T: FromStr + PartialOrd + Copy + Send + Sync + 'static,
{
	fn validate(&self, key: &str, val: &str, _container: &Properties) -> Result<(), String> {
		if val.is_empty() {
			return Ok(());
		}
		parse_range::<T>(val, Overlap::Reject).map(|_| ()).map_err(|e| {
			format!(
				"can't set {key} to {val}: {e}; use two dots for a range and commas between ranges, e.g. 3..7,13"
			)
		})
	}
}

/// Comma-separated integer list where every element satisfies a range.
pub struct IntsValidator {
	inner: RangeValidator<i32>,
}

impl IntsValidator {
	pub fn new(min: i32, max: i32) -> Self {
		Self {
			inner: RangeValidator::bounds(min, max),
		}
	}
}

impl Validator for IntsValidator {
	fn validate(&self, key: &str, val: &str, container: &Properties) -> Result<(), String> {
		if val.is_empty() {
			return Ok(());
		}
		for item in val.split(',') {
			self.inner.validate(key, item.trim(), container)?;
		}
		Ok(())
	}
}

/// Comma-separated float list where every element satisfies a range.
pub struct FloatsValidator {
	inner: RangeValidator<f32>,
}

impl FloatsValidator {
	pub fn new(min: f32, max: f32) -> Self {
		Self {
			inner: RangeValidator::bounds(min, max),
		}
	}
}

impl Validator for FloatsValidator {
	fn validate(&self, key: &str, val: &str, container: &Properties) -> Result<(), String> {
		if val.is_empty() {
			return Ok(());
		}
		for item in val.split(',') {
			self.inner.validate(key, item.trim(), container)?;
		}
		Ok(())
	}
}
