//! SeaORM Entity for tags table

use sea_orm::entity::prelude::*;
use sea_orm::ActiveValue;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "tags")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub title: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::post_tags::Entity")]
    PostTags,
}

impl Related<super::post_tags::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PostTags.def()
    }
}

impl ActiveModelBehavior for ActiveModel {
    /// Titles are stored lowercase so uniqueness is case-insensitive.
    fn before_save(mut self, _insert: bool) -> Result<Self, DbErr> {
        if let ActiveValue::Set(title) = &self.title {
            let lowered = title.to_lowercase();
            self.title = ActiveValue::Set(lowered);
        }
        Ok(self)
    }
}
