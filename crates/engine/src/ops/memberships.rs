use chrono::Utc;
use sea_orm::{ActiveValue, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{Group, Member, ResultEngine, group_members, groups, util::normalize_required_name};

use super::{Engine, with_tx};

impl Engine {
    /// Creates a group; the creator becomes its first active member.
    pub async fn create_group(&self, name: &str, user_id: &str) -> ResultEngine<Group> {
        let name = normalize_required_name(name, "group")?;
        with_tx!(self, |db_tx| {
            self.require_user_exists(&db_tx, user_id).await?;

            let now = Utc::now();
            let group = Group {
                id: Uuid::new_v4(),
                name,
                created_by: user_id.to_string(),
                created_at: now,
            };
            groups::ActiveModel::from(&group).insert(&db_tx).await?;
            group_members::ActiveModel {
                group_id: ActiveValue::Set(group.id.to_string()),
                user_id: ActiveValue::Set(user_id.to_string()),
                joined_at: ActiveValue::Set(now),
                left_at: ActiveValue::Set(None),
            }
            .insert(&db_tx)
            .await?;

            tracing::info!(group_id = %group.id, user = %user_id, "group created");
            Ok(group)
        })
    }

    /// Adds `user_id` to the group, or re-activates a member who left.
    ///
    /// Joining while already active is a no-op.
    pub async fn join_group(&self, group_id: Uuid, user_id: &str) -> ResultEngine<Member> {
        with_tx!(self, |db_tx| {
            self.require_group(&db_tx, group_id).await?;
            let user = self.require_user_exists(&db_tx, user_id).await?;

            let model = match self.find_membership(&db_tx, group_id, user_id).await? {
                Some(existing) if existing.left_at.is_none() => existing,
                Some(existing) => {
                    let mut active: group_members::ActiveModel = existing.into();
                    active.joined_at = ActiveValue::Set(Utc::now());
                    active.left_at = ActiveValue::Set(None);
                    active.update(&db_tx).await?
                }
                None => {
                    group_members::ActiveModel {
                        group_id: ActiveValue::Set(group_id.to_string()),
                        user_id: ActiveValue::Set(user_id.to_string()),
                        joined_at: ActiveValue::Set(Utc::now()),
                        left_at: ActiveValue::Set(None),
                    }
                    .insert(&db_tx)
                    .await?
                }
            };

            Ok(Member {
                member_id: model.user_id,
                display_name: user.shown_name().to_string(),
                joined_at: model.joined_at,
                left_at: model.left_at,
            })
        })
    }

    /// Soft-removes `user_id`: the membership is kept with `left_at` set so
    /// historical splits still resolve.
    pub async fn leave_group(&self, group_id: Uuid, user_id: &str) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let membership = self.require_active_member(&db_tx, group_id, user_id).await?;
            let mut active: group_members::ActiveModel = membership.into();
            active.left_at = ActiveValue::Set(Some(Utc::now()));
            active.update(&db_tx).await?;

            tracing::info!(%group_id, user = %user_id, "member left group");
            Ok(())
        })
    }

    /// Lists every member of the group, including departed ones.
    pub async fn list_members(&self, group_id: Uuid, user_id: &str) -> ResultEngine<Vec<Member>> {
        with_tx!(self, |db_tx| {
            self.require_active_member(&db_tx, group_id, user_id).await?;
            self.group_members(&db_tx, group_id).await
        })
    }
}
