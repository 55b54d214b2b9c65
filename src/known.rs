//! Human-readable aliases for well-known representative accounts, mirroring
//! `known.py` referenced by `original_source/app/backend/data_processor.py`
//! (`known.get(account)`). That alias directory itself was not part of the
//! retrieved source, so this module holds a small illustrative seed set;
//! callers always fall back to the raw account id when no alias is known.

use std::collections::HashMap;

pub struct KnownAliases {
	aliases: HashMap<&'static str, &'static str>,
}

impl KnownAliases {
	pub fn new() -> Self {
		let mut aliases = HashMap::new();
		aliases.insert(
			"nano_3dmtrrws3pe15x5xcrzb1ygb1yx1xp4pr9y6eaejbwu51xekhrniuyc7dhnt",
			"Nano Foundation",
		);
		aliases.insert(
			"nano_1natrium1o3z558oukvv3ht3mz6xtlgoizrn9wyd4qy4c6wqaf7t4tfh5ku5",
			"Natrium (BinanceNode)",
		);
		Self { aliases }
	}

	pub fn alias_or_account(&self, account: &str) -> String {
		self.aliases.get(account).map(|s| s.to_string()).unwrap_or_else(|| account.to_string())
	}
}

impl Default for KnownAliases {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn falls_back_to_raw_account_id() {
		let known = KnownAliases::new();
		assert_eq!(known.alias_or_account("nano_unknown"), "nano_unknown");
	}

	#[test]
	fn resolves_known_alias() {
		let known = KnownAliases::new();
		assert_eq!(
			known.alias_or_account("nano_3dmtrrws3pe15x5xcrzb1ygb1yx1xp4pr9y6eaejbwu51xekhrniuyc7dhnt"),
			"Nano Foundation"
		);
	}
}
