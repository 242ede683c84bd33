//! Spatial entity repository contracts and SQLite implementation.
//!
//! # Invariants
//! - Writes call `SpatialEntity::validate()` first.
//! - `update_entity` never rewrites `kind` or `created_at`.

use crate::geometry::ShapeKind;
use crate::model::spatial_entity::SpatialEntity;
use crate::model::SpatialEntityId;
use crate::repo::{RepoError, RepoResult};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

const ENTITY_SELECT_SQL: &str = "SELECT
    id,
    name,
    kind,
    geometry_text,
    description,
    color,
    created_at,
    updated_at,
    chapter_id
FROM spatial_entities";

/// Repository interface for spatial entity operations.
pub trait SpatialEntityRepository {
    fn create_entity(&self, entity: &SpatialEntity) -> RepoResult<SpatialEntityId>;
    fn update_entity(&self, entity: &SpatialEntity) -> RepoResult<()>;
    fn get_entity(&self, id: SpatialEntityId) -> RepoResult<Option<SpatialEntity>>;
    fn list_entities(&self, kind: Option<ShapeKind>) -> RepoResult<Vec<SpatialEntity>>;
}

/// SQLite-backed spatial entity repository.
pub struct SqliteSpatialEntityRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSpatialEntityRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl SpatialEntityRepository for SqliteSpatialEntityRepository<'_> {
    fn create_entity(&self, entity: &SpatialEntity) -> RepoResult<SpatialEntityId> {
        entity.validate()?;

        self.conn.execute(
            "INSERT INTO spatial_entities (
                name,
                kind,
                geometry_text,
                description,
                color,
                created_at,
                updated_at,
                chapter_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                entity.name(),
                entity.kind().as_str(),
                entity.geometry_text(),
                entity.description(),
                entity.color(),
                entity.created_at,
                entity.updated_at(),
                entity.chapter_id,
            ],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    fn update_entity(&self, entity: &SpatialEntity) -> RepoResult<()> {
        entity.validate()?;
        let id = entity.id.ok_or_else(|| {
            RepoError::InvalidData("cannot update a spatial entity without id".to_string())
        })?;

        let changed = self.conn.execute(
            "UPDATE spatial_entities
             SET
                name = ?2,
                geometry_text = ?3,
                description = ?4,
                color = ?5,
                updated_at = ?6,
                chapter_id = ?7
             WHERE id = ?1
               AND kind = ?8;",
            params![
                id,
                entity.name(),
                entity.geometry_text(),
                entity.description(),
                entity.color(),
                entity.updated_at(),
                entity.chapter_id,
                entity.kind().as_str(),
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "spatial entity",
                id,
            });
        }
        Ok(())
    }

    fn get_entity(&self, id: SpatialEntityId) -> RepoResult<Option<SpatialEntity>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ENTITY_SELECT_SQL} WHERE id = ?1;"))?;
        let row = stmt.query_row([id], |row| Ok(parse_entity_row(row))).optional()?;
        row.transpose()
    }

    fn list_entities(&self, kind: Option<ShapeKind>) -> RepoResult<Vec<SpatialEntity>> {
        let mut sql = format!("{ENTITY_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(kind) = kind {
            sql.push_str(" AND kind = ?");
            bind_values.push(Value::Text(kind.as_str().to_string()));
        }
        sql.push_str(" ORDER BY updated_at DESC, id ASC");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut entities = Vec::new();
        while let Some(row) = rows.next()? {
            entities.push(parse_entity_row(row)?);
        }
        Ok(entities)
    }
}

fn parse_entity_row(row: &Row<'_>) -> RepoResult<SpatialEntity> {
    let id: SpatialEntityId = row.get("id")?;
    let kind_text: String = row.get("kind")?;
    let kind = ShapeKind::parse(&kind_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid kind `{kind_text}` in spatial_entities.kind"
        ))
    })?;

    let entity = SpatialEntity::from_parts(
        id,
        row.get("name")?,
        kind,
        row.get("geometry_text")?,
        row.get("description")?,
        row.get("color")?,
        row.get("created_at")?,
        row.get("updated_at")?,
        row.get("chapter_id")?,
    );
    entity.validate().map_err(|err| {
        RepoError::InvalidData(format!("spatial entity {id} failed validation: {err}"))
    })?;
    Ok(entity)
}
