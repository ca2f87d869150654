//! String codec: bidirectional conversion between typed values and their
//! canonical text form.
//!
//! Every property cell round-trips through this trait. Decode failures are
//! never fatal: the codec emits a diagnostic and leaves the previous value
//! in place, so callers can treat a failed decode as "kept previous/default".

use crate::validators::{NumericValidator, Signedness, ValidatorRef};

/// Bidirectional value ↔ text conversion plus a stable type tag.
///
/// Contract: `decode(encode(v))` restores `v` for every legal value. Float
/// formatting relies on Rust's shortest round-trip `Display` in both
/// directions.
pub trait Codec: Clone + Send + Sync + 'static {
	/// Parse `text` into `self` in place. On unparsable input, emit a
	/// diagnostic and keep the previous value.
	fn decode(&mut self, text: &str);

	/// Canonical, round-trippable textual representation.
	fn encode(&self) -> String;

	/// Stable tag used in diagnostics and storage annotations.
	fn type_tag() -> &'static str;

	/// The implicit validator applied when a property of this type is
	/// registered without an explicit one. Numeric types return a
	/// width-bounded [`NumericValidator`]; everything else has none.
	fn default_validator() -> Option<ValidatorRef> {
		None
	}
}

/// Strips a fractional tail of zeros (`"5.000"` → `"5"`) so integer decode
/// accepts the float-ish literals the numeric validator tolerates.
pub(crate) fn clean_integer_text(text: &str) -> &str {
	if let Some((head, tail)) = text.split_once('.')
		&& !head.is_empty()
		&& !tail.is_empty()
		&& tail.bytes().all(|b| b == b'0')
	{
		head
	} else {
		text
	}
}

macro_rules! integer_codec {
	($($t:ty => $tag:literal, $sign:ident;)+) => {$(
		impl Codec for $t {
			fn decode(&mut self, text: &str) {
				let text = text.trim();
				let parsed = if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
					<$t>::from_str_radix(hex, 16)
				} else {
					clean_integer_text(text).parse::<$t>()
				};
				match parsed {
					Ok(v) => *self = v,
					Err(_) => {
						tracing::warn!(value = text, ty = $tag, "unparsable value; keeping previous");
					}
				}
			}

			fn encode(&self) -> String {
				self.to_string()
			}

			fn type_tag() -> &'static str {
				$tag
			}

			fn default_validator() -> Option<ValidatorRef> {
				Some(ValidatorRef::owned(NumericValidator::<$t>::new(Signedness::$sign)))
			}
		}
	)+};
}

integer_codec! {
	i8 => "i8", Signed;
	i16 => "i16", Signed;
	i32 => "i32", Signed;
	i64 => "i64", Signed;
	u8 => "u8", Unsigned;
	u16 => "u16", Unsigned;
	u32 => "u32", Unsigned;
	u64 => "u64", Unsigned;
}

macro_rules! float_codec {
	($($t:ty => $tag:literal;)+) => {$(
		impl Codec for $t {
			fn decode(&mut self, text: &str) {
				match text.trim().parse::<$t>() {
					Ok(v) => *self = v,
					Err(_) => {
						tracing::warn!(value = text, ty = $tag, "unparsable value; keeping previous");
					}
				}
			}

			fn encode(&self) -> String {
				self.to_string()
			}

			fn type_tag() -> &'static str {
				$tag
			}
		}
	)+};
}

float_codec! {
	f32 => "f32";
	f64 => "f64";
}

impl Codec for bool {
	/// `"true"`/`"false"` literals, or an integer with the legacy coercion:
	/// any value `<= 0` is `false`, anything positive is `true`.
	fn decode(&mut self, text: &str) {
		match text.trim() {
			"true" => *self = true,
			"false" => *self = false,
			other => match other.parse::<i64>() {
				Ok(n) => *self = n > 0,
				Err(_) => {
					tracing::warn!(value = text, ty = "bool", "unparsable value; keeping previous");
				}
			},
		}
	}

	fn encode(&self) -> String {
		self.to_string()
	}

	fn type_tag() -> &'static str {
		"bool"
	}
}

impl Codec for char {
	fn decode(&mut self, text: &str) {
		let mut chars = text.chars();
		match (chars.next(), chars.next()) {
			(Some(c), None) => *self = c,
			_ => {
				tracing::warn!(value = text, ty = "char", "expected exactly one character; keeping previous");
			}
		}
	}

	fn encode(&self) -> String {
		self.to_string()
	}

	fn type_tag() -> &'static str {
		"char"
	}
}

impl Codec for String {
	fn decode(&mut self, text: &str) {
		text.clone_into(self);
	}

	fn encode(&self) -> String {
		self.clone()
	}

	fn type_tag() -> &'static str {
		"string"
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn round_trip<T: Codec + PartialEq + std::fmt::Debug>(initial: T, expected: T) {
		let mut v = initial;
		let text = expected.encode();
		v.decode(&text);
		assert_eq!(v, expected);
	}

	#[test]
	fn test_round_trip_integers() {
		round_trip(0i32, -42);
		round_trip(0u8, 255);
		round_trip(0i64, i64::MIN);
		round_trip(0u64, u64::MAX);
	}

	#[test]
	fn test_round_trip_floats() {
		round_trip(0.0f32, 0.1);
		round_trip(0.0f64, -1.5e300);
	}

	#[test]
	fn test_round_trip_misc() {
		round_trip(false, true);
		round_trip('a', 'ß');
		round_trip(String::new(), "hello world".to_string());
	}

	#[test]
	fn test_bad_decode_keeps_previous() {
		let mut v = 7i32;
		v.decode("banana");
		assert_eq!(v, 7);

		let mut f = 2.5f64;
		f.decode("");
		assert_eq!(f, 2.5);
	}

	#[test]
	fn test_integer_decode_accepts_zero_fraction() {
		let mut v = 0i32;
		v.decode("5.000");
		assert_eq!(v, 5);
		v.decode("6.5");
		assert_eq!(v, 5);
	}

	#[test]
	fn test_integer_decode_accepts_hex() {
		let mut v = 0u32;
		v.decode("0x1F");
		assert_eq!(v, 31);
	}

	#[test]
	fn test_bool_integer_coercion() {
		let mut b = true;
		b.decode("0");
		assert!(!b);
		b.decode("3");
		assert!(b);
		b.decode("-2");
		assert!(!b);
	}
}
