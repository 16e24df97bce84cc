//! Integration tests against a live PostgreSQL database.
//!
//! Ignored by default; run with `cargo test -p deckscope-db --features migrations -- --ignored`.

use deckscope_db::test_fixtures::{connect_test, unique_name};
use deckscope_db::{
    CardMeta, CardPatch, CardRepository, CardRow, CardStatus, CardVisibility, Database, Error,
    Grade, GradeRepository, LinkKind, TaxonomyKind, TaxonomyRepository,
};
use uuid::Uuid;

async fn setup() -> Database {
    dotenvy::dotenv().ok();
    let db = connect_test().await.expect("Failed to connect to test database");
    #[cfg(feature = "migrations")]
    db.migrate().await.expect("Failed to run migrations");
    db
}

fn row(front: &str, chapter_id: Option<Uuid>) -> CardRow {
    CardRow {
        front: front.to_string(),
        back: "back".to_string(),
        chapter_id,
        status: CardStatus::Published,
        visibility: CardVisibility::Public,
        meta: CardMeta::default(),
    }
}

#[tokio::test]
#[ignore]
async fn test_taxonomy_name_is_unique_per_kind() {
    let db = setup().await;
    let name = unique_name("topic");

    let id = db.taxonomy.create(TaxonomyKind::Topic, &name).await.unwrap();
    let again = db.taxonomy.create(TaxonomyKind::Topic, &name).await;
    assert!(matches!(again, Err(Error::Conflict(_))));
    assert_eq!(
        db.taxonomy.find_by_name(TaxonomyKind::Topic, &name).await.unwrap(),
        Some(id)
    );
    db.taxonomy.delete(TaxonomyKind::Topic, id).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_card_links_and_patch() {
    let db = setup().await;
    let chapter = db
        .taxonomy
        .create(TaxonomyKind::Chapter, &unique_name("chapter"))
        .await
        .unwrap();
    let tag_a = db.taxonomy.create(TaxonomyKind::Tag, &unique_name("a")).await.unwrap();
    let tag_b = db.taxonomy.create(TaxonomyKind::Tag, &unique_name("b")).await.unwrap();
    let card_id = db.cards.insert_card(row("pg links", Some(chapter))).await.unwrap();

    db.cards.insert_links(card_id, LinkKind::Tag, &[tag_a, tag_b]).await.unwrap();
    assert_eq!(db.cards.delete_links(card_id, LinkKind::Tag).await.unwrap(), 2);
    db.cards.insert_links(card_id, LinkKind::Tag, &[tag_b]).await.unwrap();

    db.cards
        .update_card(
            card_id,
            CardPatch {
                author_suspended: Some(true),
                chapter_id: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let cards = db.cards.fetch_cards().await.unwrap();
    let card = cards.iter().find(|c| c.id == card_id).unwrap();
    assert!(card.author_suspended);
    assert_eq!(card.chapter_id, None);
    assert_eq!(card.tags.len(), 1);
    assert_eq!(card.tags[0].tag_id, tag_b);

    db.cards.delete_links(card_id, LinkKind::Tag).await.unwrap();
    db.cards.delete_card(card_id).await.unwrap();
    for tag in [tag_a, tag_b] {
        db.taxonomy.delete(TaxonomyKind::Tag, tag).await.unwrap();
    }
    db.taxonomy.delete(TaxonomyKind::Chapter, chapter).await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_grade_upsert_last_write_wins() {
    let db = setup().await;
    let card_id = db.cards.insert_card(row("pg grades", None)).await.unwrap();
    let user = Uuid::new_v4();

    db.grades.upsert_grade(user, card_id, Grade::Again).await.unwrap();
    db.grades.upsert_grade(user, card_id, Grade::Good).await.unwrap();

    let grades = db.grades.fetch_user_grades(user).await.unwrap();
    assert_eq!(grades.len(), 1);
    assert_eq!(grades.get(&card_id), Some(&Grade::Good));

    assert_eq!(db.grades.delete_for_card(card_id).await.unwrap(), 1);
    db.cards.delete_card(card_id).await.unwrap();
}
