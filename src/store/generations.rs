//! Generation and question row operations.

use super::models::{Generation, NewQuestion, Question, QuestionUpdate};
use super::Store;
use crate::error::{KvissError, Result};
use rusqlite::{params, OptionalExtension, Row};
use std::collections::BTreeSet;
use tracing::{debug, instrument};

fn generation_from_row(row: &Row<'_>) -> rusqlite::Result<Generation> {
    let video_ids_json: String = row.get(1)?;
    let created_at: String = row.get(3)?;
    let updated_at: String = row.get(4)?;

    Ok(Generation {
        id: row.get(0)?,
        video_ids: serde_json::from_str(&video_ids_json).unwrap_or_default(),
        question_count: row.get(2)?,
        created_at: Store::parse_ts(&created_at),
        updated_at: Store::parse_ts(&updated_at),
    })
}

fn question_from_row(row: &Row<'_>) -> rusqlite::Result<Question> {
    let difficulty: Option<String> = row.get(6)?;
    let question_type: Option<String> = row.get(7)?;
    let created_at: String = row.get(9)?;
    let updated_at: String = row.get(10)?;

    Ok(Question {
        id: row.get(0)?,
        generation_id: row.get(1)?,
        video_id: row.get(2)?,
        question_text: row.get(3)?,
        answer: row.get(4)?,
        context: row.get(5)?,
        difficulty: difficulty.and_then(|d| d.parse().ok()),
        question_type: question_type.and_then(|t| t.parse().ok()),
        order_index: row.get(8)?,
        created_at: Store::parse_ts(&created_at),
        updated_at: Store::parse_ts(&updated_at),
    })
}

const GENERATION_COLUMNS: &str = "id, video_ids, question_count, created_at, updated_at";
const QUESTION_COLUMNS: &str = "id, generation_id, video_id, question_text, answer, context, \
                                difficulty, question_type, order_index, created_at, updated_at";

impl Store {
    /// Create a generation together with its questions, in one transaction.
    /// Question order follows the slice order.
    #[instrument(skip(self, questions), fields(videos = video_ids.len(), questions = questions.len()))]
    pub fn create_generation(
        &self,
        video_ids: &[String],
        questions: &[NewQuestion],
    ) -> Result<Generation> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;
        let now = Store::now();

        tx.execute(
            r#"
            INSERT INTO generations (video_ids, question_count, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                serde_json::to_string(video_ids)?,
                questions.len() as i64,
                now,
                now,
            ],
        )?;
        let generation_id = tx.last_insert_rowid();

        for (position, q) in questions.iter().enumerate() {
            tx.execute(
                r#"
                INSERT INTO questions
                (generation_id, video_id, question_text, answer, context,
                 difficulty, question_type, order_index, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                "#,
                params![
                    generation_id,
                    q.video_id,
                    q.question_text,
                    q.answer,
                    q.context,
                    q.difficulty.map(|d| d.as_str()),
                    q.question_type.map(|t| t.as_str()),
                    position as i64,
                    now,
                    now,
                ],
            )?;
        }

        tx.commit()?;
        debug!(
            "Created generation {} with {} questions",
            generation_id,
            questions.len()
        );

        let generation = conn.query_row(
            &format!(
                "SELECT {} FROM generations WHERE id = ?1",
                GENERATION_COLUMNS
            ),
            params![generation_id],
            generation_from_row,
        )?;
        Ok(generation)
    }

    pub fn get_generation(&self, id: i64) -> Result<Option<Generation>> {
        let conn = self.lock()?;
        let generation = conn
            .query_row(
                &format!(
                    "SELECT {} FROM generations WHERE id = ?1",
                    GENERATION_COLUMNS
                ),
                params![id],
                generation_from_row,
            )
            .optional()?;
        Ok(generation)
    }

    /// List generations, newest first.
    pub fn list_generations(&self, skip: i64, limit: i64) -> Result<Vec<Generation>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM generations ORDER BY id DESC LIMIT ?1 OFFSET ?2",
            GENERATION_COLUMNS
        ))?;
        let rows = stmt.query_map(params![limit, skip], generation_from_row)?;
        let generations: Vec<Generation> = rows.filter_map(|g| g.ok()).collect();
        Ok(generations)
    }

    pub fn count_generations(&self) -> Result<i64> {
        let conn = self.lock()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM generations", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn delete_generation(&self, id: i64) -> Result<()> {
        let conn = self.lock()?;
        // Question rows cascade via their foreign key.
        let deleted = conn.execute("DELETE FROM generations WHERE id = ?1", params![id])?;
        if deleted == 0 {
            return Err(KvissError::NotFound(format!("Generation {}", id)));
        }
        Ok(())
    }

    /// Questions of one generation, in display order.
    pub fn questions_for_generation(&self, generation_id: i64) -> Result<Vec<Question>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM questions WHERE generation_id = ?1 ORDER BY order_index",
            QUESTION_COLUMNS
        ))?;
        let rows = stmt.query_map(params![generation_id], question_from_row)?;
        let questions: Vec<Question> = rows.filter_map(|q| q.ok()).collect();
        Ok(questions)
    }

    /// Look up one question within a generation.
    pub fn get_question(&self, generation_id: i64, question_id: i64) -> Result<Option<Question>> {
        let conn = self.lock()?;
        let question = conn
            .query_row(
                &format!(
                    "SELECT {} FROM questions WHERE id = ?1 AND generation_id = ?2",
                    QUESTION_COLUMNS
                ),
                params![question_id, generation_id],
                question_from_row,
            )
            .optional()?;
        Ok(question)
    }

    /// Apply a partial update to a question. Enum fields are validated and
    /// rejected with Validation on unknown values.
    #[instrument(skip(self, update))]
    pub fn update_question(
        &self,
        generation_id: i64,
        question_id: i64,
        update: &QuestionUpdate,
    ) -> Result<Question> {
        let mut question = self
            .get_question(generation_id, question_id)?
            .ok_or_else(|| {
                KvissError::NotFound(format!(
                    "Question {} in generation {}",
                    question_id, generation_id
                ))
            })?;

        if let Some(text) = &update.question_text {
            if text.trim().is_empty() {
                return Err(KvissError::Validation(
                    "question_text must not be empty".to_string(),
                ));
            }
            question.question_text = text.clone();
        }
        if let Some(answer) = &update.answer {
            question.answer = Some(answer.clone());
        }
        if let Some(context) = &update.context {
            question.context = Some(context.clone());
        }
        if let Some(difficulty) = &update.difficulty {
            question.difficulty = Some(
                difficulty
                    .parse()
                    .map_err(|e: String| KvissError::Validation(e))?,
            );
        }
        if let Some(question_type) = &update.question_type {
            question.question_type = Some(
                question_type
                    .parse()
                    .map_err(|e: String| KvissError::Validation(e))?,
            );
        }
        if let Some(order_index) = update.order_index {
            if order_index < 0 {
                return Err(KvissError::Validation(
                    "order_index must not be negative".to_string(),
                ));
            }
            question.order_index = order_index;
        }

        let now = Store::now();
        let conn = self.lock()?;
        conn.execute(
            r#"
            UPDATE questions
            SET question_text = ?1, answer = ?2, context = ?3,
                difficulty = ?4, question_type = ?5, order_index = ?6, updated_at = ?7
            WHERE id = ?8 AND generation_id = ?9
            "#,
            params![
                question.question_text,
                question.answer,
                question.context,
                question.difficulty.map(|d| d.as_str()),
                question.question_type.map(|t| t.as_str()),
                question.order_index,
                now,
                question_id,
                generation_id,
            ],
        )?;
        conn.execute(
            "UPDATE generations SET updated_at = ?1 WHERE id = ?2",
            params![now, generation_id],
        )?;

        question.updated_at = Store::parse_ts(&now);
        Ok(question)
    }

    pub fn delete_question(&self, generation_id: i64, question_id: i64) -> Result<()> {
        let conn = self.lock()?;
        let deleted = conn.execute(
            "DELETE FROM questions WHERE id = ?1 AND generation_id = ?2",
            params![question_id, generation_id],
        )?;
        if deleted == 0 {
            return Err(KvissError::NotFound(format!(
                "Question {} in generation {}",
                question_id, generation_id
            )));
        }
        Ok(())
    }

    /// Reassign order indexes from the given id list, atomically.
    ///
    /// The id list must match the generation's question set exactly (same
    /// cardinality, same membership); any mismatch fails with Validation and
    /// leaves the order unchanged.
    #[instrument(skip(self, question_ids), fields(count = question_ids.len()))]
    pub fn reorder_questions(
        &self,
        generation_id: i64,
        question_ids: &[i64],
    ) -> Result<Vec<Question>> {
        self.get_generation(generation_id)?
            .ok_or_else(|| KvissError::NotFound(format!("Generation {}", generation_id)))?;

        let existing = self.questions_for_generation(generation_id)?;
        let existing_ids: BTreeSet<i64> = existing.iter().map(|q| q.id).collect();
        let requested_ids: BTreeSet<i64> = question_ids.iter().copied().collect();

        if question_ids.len() != existing.len() || existing_ids != requested_ids {
            return Err(KvissError::Validation(format!(
                "question_ids must contain exactly the generation's {} question id(s)",
                existing.len()
            )));
        }

        let now = Store::now();
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        for (position, question_id) in question_ids.iter().enumerate() {
            tx.execute(
                "UPDATE questions SET order_index = ?1, updated_at = ?2 \
                 WHERE id = ?3 AND generation_id = ?4",
                params![position as i64, now, question_id, generation_id],
            )?;
        }
        tx.execute(
            "UPDATE generations SET updated_at = ?1 WHERE id = ?2",
            params![now, generation_id],
        )?;

        tx.commit()?;
        drop(conn);

        self.questions_for_generation(generation_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Difficulty, QuestionType};

    fn question(video_id: &str, text: &str) -> NewQuestion {
        NewQuestion {
            video_id: video_id.to_string(),
            question_text: text.to_string(),
            answer: Some("because".to_string()),
            context: None,
            difficulty: Some(Difficulty::Easy),
            question_type: Some(QuestionType::Factual),
        }
    }

    fn seed_generation(store: &Store, count: usize) -> Generation {
        let questions: Vec<NewQuestion> = (0..count)
            .map(|i| question("aaaaaaaaaaa", &format!("Q{}?", i)))
            .collect();
        store
            .create_generation(&["aaaaaaaaaaa".to_string()], &questions)
            .unwrap()
    }

    #[test]
    fn test_create_and_order_indexes() {
        let store = Store::in_memory(4).unwrap();
        let generation = seed_generation(&store, 3);

        assert_eq!(generation.question_count, 3);
        assert_eq!(generation.video_ids, vec!["aaaaaaaaaaa"]);

        let questions = store.questions_for_generation(generation.id).unwrap();
        let order: Vec<i64> = questions.iter().map(|q| q.order_index).collect();
        assert_eq!(order, vec![0, 1, 2]);
        assert_eq!(questions[0].question_text, "Q0?");
        assert_eq!(questions[0].difficulty, Some(Difficulty::Easy));
    }

    #[test]
    fn test_reorder() {
        let store = Store::in_memory(4).unwrap();
        let generation = seed_generation(&store, 3);
        let ids: Vec<i64> = store
            .questions_for_generation(generation.id)
            .unwrap()
            .iter()
            .map(|q| q.id)
            .collect();

        let reordered = store
            .reorder_questions(generation.id, &[ids[2], ids[0], ids[1]])
            .unwrap();

        assert_eq!(reordered[0].id, ids[2]);
        assert_eq!(reordered[1].id, ids[0]);
        assert_eq!(reordered[2].id, ids[1]);
        let order: Vec<i64> = reordered.iter().map(|q| q.order_index).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn test_reorder_mismatch_rejected() {
        let store = Store::in_memory(4).unwrap();
        let generation = seed_generation(&store, 3);
        let ids: Vec<i64> = store
            .questions_for_generation(generation.id)
            .unwrap()
            .iter()
            .map(|q| q.id)
            .collect();

        // Cardinality mismatch.
        let err = store
            .reorder_questions(generation.id, &[ids[0], ids[1]])
            .unwrap_err();
        assert!(matches!(err, KvissError::Validation(_)));

        // Foreign id.
        let err = store
            .reorder_questions(generation.id, &[ids[0], ids[1], 99999])
            .unwrap_err();
        assert!(matches!(err, KvissError::Validation(_)));

        // Duplicated id hides a missing one.
        let err = store
            .reorder_questions(generation.id, &[ids[0], ids[0], ids[1]])
            .unwrap_err();
        assert!(matches!(err, KvissError::Validation(_)));

        // Order unchanged after all rejections.
        let questions = store.questions_for_generation(generation.id).unwrap();
        let current: Vec<i64> = questions.iter().map(|q| q.id).collect();
        assert_eq!(current, ids);
    }

    #[test]
    fn test_update_question() {
        let store = Store::in_memory(4).unwrap();
        let generation = seed_generation(&store, 1);
        let q = &store.questions_for_generation(generation.id).unwrap()[0];

        let updated = store
            .update_question(
                generation.id,
                q.id,
                &QuestionUpdate {
                    question_text: Some("What changed?".to_string()),
                    difficulty: Some("hard".to_string()),
                    ..QuestionUpdate::default()
                },
            )
            .unwrap();

        assert_eq!(updated.question_text, "What changed?");
        assert_eq!(updated.difficulty, Some(Difficulty::Hard));
        // Untouched fields survive.
        assert_eq!(updated.answer.as_deref(), Some("because"));
    }

    #[test]
    fn test_update_question_invalid_enum() {
        let store = Store::in_memory(4).unwrap();
        let generation = seed_generation(&store, 1);
        let q = &store.questions_for_generation(generation.id).unwrap()[0];

        let err = store
            .update_question(
                generation.id,
                q.id,
                &QuestionUpdate {
                    difficulty: Some("impossible".to_string()),
                    ..QuestionUpdate::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, KvissError::Validation(_)));
    }

    #[test]
    fn test_delete_generation_cascades() {
        let store = Store::in_memory(4).unwrap();
        let generation = seed_generation(&store, 2);

        store.delete_generation(generation.id).unwrap();
        assert!(store.get_generation(generation.id).unwrap().is_none());
        assert!(store
            .questions_for_generation(generation.id)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_delete_question_scoped_to_generation() {
        let store = Store::in_memory(4).unwrap();
        let g1 = seed_generation(&store, 1);
        let g2 = seed_generation(&store, 1);
        let q1 = store.questions_for_generation(g1.id).unwrap()[0].id;

        // Wrong generation id does not delete.
        assert!(matches!(
            store.delete_question(g2.id, q1).unwrap_err(),
            KvissError::NotFound(_)
        ));

        store.delete_question(g1.id, q1).unwrap();
        assert!(store.questions_for_generation(g1.id).unwrap().is_empty());
    }
}
