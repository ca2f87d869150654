//! Explicit command-line context.
//!
//! Holds the process argument vector once, with an explicit lifecycle, and
//! assembles settings text from it on demand. Registries consume the
//! output through their ordinary load fronts.

/// How [`ArgsContext::settings`] assembles its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsMode {
	/// Every section whose name starts with the prefix, as INI text with
	/// `[section]` headers.
	IniMulti,
	/// Entries of every prefix-matching section, as bare `key=value` lines.
	SectionMulti,
	/// Entries of the section named exactly by the prefix, as bare lines.
	SectionSingle,
}

/// Command-line arguments in the `name:` / `key=value` form.
pub struct ArgsContext {
	args: Vec<String>,
}

impl ArgsContext {
	pub fn new(args: impl IntoIterator<Item = String>) -> Self {
		Self {
			args: args.into_iter().collect(),
		}
	}

	/// Captures the process arguments, program name excluded.
	pub fn from_env() -> Self {
		Self::new(std::env::args().skip(1))
	}

	pub fn args(&self) -> &[String] {
		&self.args
	}

	/// Assembles settings text for sections selected by `prefix` under the
	/// given mode. Entries before the first `name:` belong to the unnamed
	/// section, selectable with an empty prefix.
	pub fn settings(&self, prefix: &str, mode: SettingsMode) -> String {
		let mut out = String::new();
		let mut current = String::new();
		let mut header_pending = true;
		for arg in &self.args {
			if let Some(name) = arg.strip_suffix(':') {
				current = name.to_string();
				header_pending = true;
				continue;
			}
			let selected = match mode {
				SettingsMode::IniMulti | SettingsMode::SectionMulti => current.starts_with(prefix),
				SettingsMode::SectionSingle => current == prefix,
			};
			if !selected {
				continue;
			}
			if mode == SettingsMode::IniMulti && header_pending && !current.is_empty() {
				out.push('[');
				out.push_str(&current);
				out.push_str("]\n");
			}
			header_pending = false;
			out.push_str(arg);
			out.push('\n');
		}
		out
	}
}
