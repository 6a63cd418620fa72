use super::model::{Canvas, Prompt, SourceKind, SourceRef};
use anyhow::{anyhow, Result};
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

pub struct SourceRepository;

impl SourceRepository {
    pub async fn find_canvas_for_owner(
        pool: &PgPool,
        id: Uuid,
        author_id: Uuid,
    ) -> Result<Option<Canvas>> {
        let canvas = sqlx::query_as::<_, Canvas>(
            r#"
            SELECT id, title, code, video_url, latest_render_at, author_id, updated_at
            FROM canvases
            WHERE id = $1 AND author_id = $2
            "#,
        )
        .bind(id)
        .bind(author_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| anyhow!("Failed to fetch canvas: {}", e))?;

        Ok(canvas)
    }

    pub async fn find_prompt_for_owner(
        pool: &PgPool,
        id: Uuid,
        author_id: Uuid,
    ) -> Result<Option<Prompt>> {
        let prompt = sqlx::query_as::<_, Prompt>(
            r#"
            SELECT id, prompt_text, code, video_url, latest_render_at, author_id, updated_at
            FROM prompts
            WHERE id = $1 AND author_id = $2
            "#,
        )
        .bind(id)
        .bind(author_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| anyhow!("Failed to fetch prompt: {}", e))?;

        Ok(prompt)
    }

    /// Stores the accepted code (when supplied) and stamps the request time
    /// the published job will carry. Results older than this stamp are later
    /// treated as superseded.
    pub async fn record_render_request(
        pool: &PgPool,
        source: SourceRef,
        code: Option<&str>,
        requested_at: OffsetDateTime,
    ) -> Result<()> {
        let sql = match source.kind {
            SourceKind::Canvas => {
                r#"
                UPDATE canvases
                SET
                    code = COALESCE($2, code),
                    latest_render_at = $3,
                    updated_at = NOW()
                WHERE id = $1
                "#
            }
            SourceKind::Prompt => {
                r#"
                UPDATE prompts
                SET
                    code = COALESCE($2, code),
                    latest_render_at = $3,
                    updated_at = NOW()
                WHERE id = $1
                "#
            }
        };

        let result = sqlx::query(sql)
            .bind(source.id)
            .bind(code)
            .bind(requested_at)
            .execute(pool)
            .await
            .map_err(|e| anyhow!("Failed to record render request: {}", e))?;

        if result.rows_affected() == 0 {
            return Err(anyhow!("{} not found", source.kind.as_str()));
        }

        Ok(())
    }

    /// Outer `None`: the entity no longer exists. Inner `None`: it exists but
    /// has never had a render requested.
    pub async fn fetch_render_state(
        pool: &PgPool,
        source: SourceRef,
    ) -> Result<Option<Option<OffsetDateTime>>> {
        let sql = match source.kind {
            SourceKind::Canvas => "SELECT latest_render_at FROM canvases WHERE id = $1",
            SourceKind::Prompt => "SELECT latest_render_at FROM prompts WHERE id = $1",
        };

        let state = sqlx::query_scalar::<_, Option<OffsetDateTime>>(sql)
            .bind(source.id)
            .fetch_optional(pool)
            .await
            .map_err(|e| anyhow!("Failed to fetch render state: {}", e))?;

        Ok(state)
    }

    pub async fn set_video_url(
        pool: &PgPool,
        source: SourceRef,
        video_url: &str,
    ) -> Result<bool> {
        let sql = match source.kind {
            SourceKind::Canvas => {
                "UPDATE canvases SET video_url = $2, updated_at = NOW() WHERE id = $1"
            }
            SourceKind::Prompt => {
                "UPDATE prompts SET video_url = $2, updated_at = NOW() WHERE id = $1"
            }
        };

        let result = sqlx::query(sql)
            .bind(source.id)
            .bind(video_url)
            .execute(pool)
            .await
            .map_err(|e| anyhow!("Failed to update video url: {}", e))?;

        Ok(result.rows_affected() > 0)
    }
}
