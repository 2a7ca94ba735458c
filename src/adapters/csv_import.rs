use crate::domain::model::{Card, CardId, OwnerId};
use crate::utils::error::Result;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize)]
struct CardRow {
    id: Option<String>,
    #[serde(alias = "term")]
    prompt: String,
    #[serde(alias = "definition")]
    answer: String,
}

/// 讀取 `prompt,answer`（或 `term,definition`）欄位的 CSV，建立新卡片
///
/// Rows without an `id` get one derived from `now` and the row number.
pub fn read_cards<R: Read>(reader: R, owner: &OwnerId, now: DateTime<Utc>) -> Result<Vec<Card>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut cards = Vec::new();
    for (index, row) in csv_reader.deserialize::<CardRow>().enumerate() {
        let row = row?;
        let id = row
            .id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| format!("{}-{}", now.timestamp_millis(), index + 1));
        cards.push(Card::new(
            CardId::new(id),
            owner.clone(),
            row.prompt,
            row.answer,
            now,
        )?);
    }

    tracing::debug!("Parsed {} cards from CSV", cards.len());
    Ok(cards)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_reads_prompt_answer_rows() {
        let data = "prompt,answer\nperro, dog\ngato,cat\n";
        let owner = OwnerId::new("sam").unwrap();
        let cards = read_cards(data.as_bytes(), &owner, now()).unwrap();

        assert_eq!(cards.len(), 2);
        assert_eq!(cards[0].answer, "dog");
        assert_eq!(cards[1].prompt, "gato");
        assert_ne!(cards[0].id, cards[1].id);
        assert!(cards.iter().all(|c| c.schedule.interval == 1 && c.is_due(now())));
    }

    #[test]
    fn test_accepts_term_definition_headers_and_ids() {
        let data = "id,term,definition\nk1,osmosis,diffusion of water\n";
        let owner = OwnerId::new("sam").unwrap();
        let cards = read_cards(data.as_bytes(), &owner, now()).unwrap();

        assert_eq!(cards[0].id.as_str(), "k1");
        assert_eq!(cards[0].answer, "diffusion of water");
    }

    #[test]
    fn test_rejects_blank_answer() {
        let data = "prompt,answer\nperro,\n";
        let owner = OwnerId::new("sam").unwrap();
        assert!(read_cards(data.as_bytes(), &owner, now()).is_err());
    }
}
