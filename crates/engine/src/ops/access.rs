use std::collections::HashMap;

use sea_orm::{DatabaseTransaction, QueryFilter, QueryOrder, prelude::*, sea_query::Expr};
use uuid::Uuid;

use crate::{EngineError, Member, ResultEngine, group_members, groups, users};

use super::Engine;

impl Engine {
    pub(super) async fn require_user_exists(
        &self,
        db: &DatabaseTransaction,
        username: &str,
    ) -> ResultEngine<users::Model> {
        users::Entity::find_by_id(username.to_string())
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("user not exists".to_string()))
    }

    pub(super) async fn require_group(
        &self,
        db: &DatabaseTransaction,
        group_id: Uuid,
    ) -> ResultEngine<groups::Model> {
        groups::Entity::find_by_id(group_id.to_string())
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("group not exists".to_string()))
    }

    /// Takes the database write lock by touching the group row, failing with
    /// `KeyNotFound` when the group is missing.
    ///
    /// Must be the first statement of a transaction that reads and then
    /// writes: SQLite cannot upgrade a read transaction while another
    /// connection writes, so writers queue here instead of failing as busy.
    pub(super) async fn lock_group(
        &self,
        db: &DatabaseTransaction,
        group_id: Uuid,
    ) -> ResultEngine<()> {
        let touched = groups::Entity::update_many()
            .col_expr(groups::Column::Name, Expr::col(groups::Column::Name).into())
            .filter(groups::Column::Id.eq(group_id.to_string()))
            .exec(db)
            .await?;
        if touched.rows_affected == 0 {
            return Err(EngineError::KeyNotFound("group not exists".to_string()));
        }
        Ok(())
    }

    pub(super) async fn find_membership(
        &self,
        db: &DatabaseTransaction,
        group_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<Option<group_members::Model>> {
        group_members::Entity::find_by_id((group_id.to_string(), user_id.to_string()))
            .one(db)
            .await
            .map_err(Into::into)
    }

    /// Membership row of `user_id`, failing with `NotAMember` when the user
    /// never joined or has left.
    pub(super) async fn require_active_member(
        &self,
        db: &DatabaseTransaction,
        group_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<group_members::Model> {
        match self.find_membership(db, group_id, user_id).await? {
            Some(model) if model.left_at.is_none() => Ok(model),
            _ => Err(EngineError::NotAMember {
                group_id,
                user_id: user_id.to_string(),
            }),
        }
    }

    /// Every member ever joined to the group, active or not, ordered by id.
    pub(super) async fn group_members(
        &self,
        db: &DatabaseTransaction,
        group_id: Uuid,
    ) -> ResultEngine<Vec<Member>> {
        let rows = group_members::Entity::find()
            .filter(group_members::Column::GroupId.eq(group_id.to_string()))
            .order_by_asc(group_members::Column::UserId)
            .all(db)
            .await?;
        let ids: Vec<&str> = rows.iter().map(|m| m.user_id.as_str()).collect();
        let names = self.display_names(db, &ids).await?;

        Ok(rows
            .into_iter()
            .map(|row| Member {
                display_name: names
                    .get(&row.user_id)
                    .cloned()
                    .unwrap_or_else(|| row.user_id.clone()),
                member_id: row.user_id,
                joined_at: row.joined_at,
                left_at: row.left_at,
            })
            .collect())
    }

    /// Display names keyed by username. Unknown users are absent.
    pub(super) async fn display_names(
        &self,
        db: &DatabaseTransaction,
        user_ids: &[&str],
    ) -> ResultEngine<HashMap<String, String>> {
        if user_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = users::Entity::find()
            .filter(users::Column::Username.is_in(user_ids.iter().copied()))
            .all(db)
            .await?;
        Ok(rows
            .into_iter()
            .map(|user| (user.username.clone(), user.shown_name().to_string()))
            .collect())
    }
}
