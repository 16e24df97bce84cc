//! Free-text and tag search over the catalog.
//!
//! A query starting with `#` searches tag names; anything else searches the
//! card text (front, back and meta section). Matching is a case-insensitive
//! substring test in both cases. Results are in catalog order.

use uuid::Uuid;

use crate::catalog::Catalog;
use crate::models::Card;
use crate::visibility::visible;

/// Parsed search query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardQuery {
    Empty,
    /// `#needle`: lowercased needle matched against tag names.
    Tag(String),
    /// Lowercased needle matched against card text.
    Text(String),
}

impl CardQuery {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if let Some(rest) = trimmed.strip_prefix('#') {
            let needle = rest.trim().to_lowercase();
            if needle.is_empty() {
                CardQuery::Empty
            } else {
                CardQuery::Tag(needle)
            }
        } else if trimmed.is_empty() {
            CardQuery::Empty
        } else {
            CardQuery::Text(trimmed.to_lowercase())
        }
    }

    pub fn matches(&self, card: &Card) -> bool {
        match self {
            CardQuery::Empty => false,
            CardQuery::Tag(needle) => card
                .tag_names()
                .iter()
                .any(|name| name.to_lowercase().contains(needle.as_str())),
            CardQuery::Text(needle) => {
                let section = card.meta.section.as_deref().unwrap_or("");
                [card.front.as_str(), card.back.as_str(), section]
                    .iter()
                    .any(|field| field.to_lowercase().contains(needle.as_str()))
            }
        }
    }
}

/// Ids of visible cards matching `raw`, in catalog order.
pub fn search(catalog: &Catalog, raw: &str, is_authenticated: bool) -> Vec<Uuid> {
    let query = CardQuery::parse(raw);
    if query == CardQuery::Empty {
        return Vec::new();
    }
    let hits: Vec<Uuid> = catalog
        .iter()
        .filter(|c| visible(c, is_authenticated) && query.matches(c))
        .map(|c| c.id)
        .collect();
    tracing::debug!(result_count = hits.len(), query = ?query, "Card search");
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::CardBuilder;

    #[test]
    fn test_parse() {
        assert_eq!(CardQuery::parse("   "), CardQuery::Empty);
        assert_eq!(CardQuery::parse("#"), CardQuery::Empty);
        assert_eq!(CardQuery::parse(" #Def "), CardQuery::Tag("def".to_string()));
        assert_eq!(CardQuery::parse("REM Sleep"), CardQuery::Text("rem sleep".to_string()));
    }

    #[test]
    fn test_tag_search_is_substring_and_case_insensitive() {
        let tagged = CardBuilder::public().tag(Uuid::new_v4(), "Definition").build();
        let other = CardBuilder::public().tag(Uuid::new_v4(), "Mechanism").build();
        let id = tagged.id;
        let catalog = Catalog::new(vec![tagged, other]);

        assert_eq!(search(&catalog, "#FINI", false), vec![id]);
        assert!(search(&catalog, "#pathway", false).is_empty());
    }

    #[test]
    fn test_text_search_fields_and_visibility() {
        let by_front = CardBuilder::public().front("What is REM sleep?").build();
        let by_back = CardBuilder::public().back("Occurs during rem phases").build();
        let by_section = CardBuilder::public().section("Rem and memory").build();
        let hidden = CardBuilder::new().front("REM hidden").build();
        let miss = CardBuilder::public().front("Glycolysis").build();
        let expected = vec![by_front.id, by_back.id, by_section.id];
        let hidden_id = hidden.id;
        let catalog = Catalog::new(vec![by_front, by_back, by_section, hidden, miss]);

        assert_eq!(search(&catalog, "rem", false), expected);
        let authed = search(&catalog, "rem", true);
        assert_eq!(authed.len(), 4);
        assert!(authed.contains(&hidden_id));
    }

    #[test]
    fn test_empty_query_returns_nothing() {
        let catalog = Catalog::new(vec![CardBuilder::public().build()]);
        assert!(search(&catalog, "", false).is_empty());
    }
}
