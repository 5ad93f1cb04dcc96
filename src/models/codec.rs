// Tokenizer seam

use anyhow::{anyhow, Result};
use tokenizers::{Tokenizer, TokenizerImpl};

/// Text <-> token id conversion for one model
pub trait TextCodec: Send + Sync {
    /// Encode with the model's special tokens (trailing EOS for T5/BART)
    fn encode(&self, text: &str) -> Result<Vec<u32>>;

    /// Decode, skipping special tokens
    fn decode(&self, ids: &[u32]) -> Result<String>;

    fn token_to_id(&self, token: &str) -> Option<u32>;

    fn unk_token_id(&self) -> Option<u32>;
}

impl TextCodec for Tokenizer {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let encoding = TokenizerImpl::encode(&**self, text, true)
            .map_err(|e| anyhow!("Failed to encode prompt: {}", e))?;
        Ok(encoding.get_ids().to_vec())
    }

    fn decode(&self, ids: &[u32]) -> Result<String> {
        TokenizerImpl::decode(&**self, ids, true).map_err(|e| anyhow!("Failed to decode output: {}", e))
    }

    fn token_to_id(&self, token: &str) -> Option<u32> {
        TokenizerImpl::token_to_id(&**self, token)
    }

    fn unk_token_id(&self) -> Option<u32> {
        ["<unk>", "[UNK]"]
            .iter()
            .find_map(|token| TokenizerImpl::token_to_id(&**self, token))
    }
}

/// Ids of `<extra_id_0>` .. `<extra_id_{count-1}>`, skipping any the
/// tokenizer maps to the unknown token or does not know at all
pub fn sentinel_token_ids(codec: &dyn TextCodec, count: usize) -> Vec<u32> {
    let unk = codec.unk_token_id();
    (0..count)
        .filter_map(|i| codec.token_to_id(&format!("<extra_id_{}>", i)))
        .filter(|id| Some(*id) != unk)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapCodec(HashMap<String, u32>);

    impl TextCodec for MapCodec {
        fn encode(&self, _text: &str) -> Result<Vec<u32>> {
            Ok(vec![])
        }
        fn decode(&self, _ids: &[u32]) -> Result<String> {
            Ok(String::new())
        }
        fn token_to_id(&self, token: &str) -> Option<u32> {
            self.0.get(token).copied()
        }
        fn unk_token_id(&self) -> Option<u32> {
            self.0.get("<unk>").copied()
        }
    }

    #[test]
    fn test_sentinels_skip_unknown() {
        let mut vocab = HashMap::new();
        vocab.insert("<unk>".to_string(), 2);
        vocab.insert("<extra_id_0>".to_string(), 250099);
        vocab.insert("<extra_id_1>".to_string(), 250098);
        vocab.insert("<extra_id_2>".to_string(), 2);
        let codec = MapCodec(vocab);

        assert_eq!(sentinel_token_ids(&codec, 100), vec![250099, 250098]);
        assert!(sentinel_token_ids(&codec, 0).is_empty());
    }
}
