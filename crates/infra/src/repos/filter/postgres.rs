use super::IUserFilterRepo;
use chrono::Weekday;
use classwatch_domain::{FilterLabels, Predicate, TimeOfDayRange, UserFilter, ID};
use sqlx::{
    types::{Json, Uuid},
    FromRow, PgPool,
};

pub struct PostgresUserFilterRepo {
    pool: PgPool,
}

impl PostgresUserFilterRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct UserFilterRaw {
    filter_uid: Uuid,
    user_uid: Uuid,
    club: Json<Predicate<String>>,
    zone: Json<Predicate<String>>,
    class_type: Json<Predicate<String>>,
    trainer: Json<Predicate<String>>,
    weekdays: Json<Predicate<Weekday>>,
    time_of_day: Option<Json<TimeOfDayRange>>,
    labels: Json<FilterLabels>,
}

impl Into<UserFilter> for UserFilterRaw {
    fn into(self) -> UserFilter {
        UserFilter {
            id: self.filter_uid.into(),
            user_id: self.user_uid.into(),
            club: self.club.0,
            zone: self.zone.0,
            class_type: self.class_type.0,
            trainer: self.trainer.0,
            weekdays: self.weekdays.0,
            time_of_day: self.time_of_day.map(|range| range.0),
            labels: self.labels.0,
        }
    }
}

#[async_trait::async_trait]
impl IUserFilterRepo for PostgresUserFilterRepo {
    async fn insert(&self, filter: &UserFilter) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO user_filters
            (filter_uid, user_uid, club, zone, class_type, trainer, weekdays, time_of_day, labels)
            VALUES($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(filter.id.inner_ref())
        .bind(filter.user_id.inner_ref())
        .bind(Json(&filter.club))
        .bind(Json(&filter.zone))
        .bind(Json(&filter.class_type))
        .bind(Json(&filter.trainer))
        .bind(Json(&filter.weekdays))
        .bind(filter.time_of_day.as_ref().map(Json))
        .bind(Json(&filter.labels))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find(&self, filter_id: &ID) -> Option<UserFilter> {
        sqlx::query_as::<_, UserFilterRaw>(
            r#"
            SELECT * FROM user_filters
            WHERE filter_uid = $1
            "#,
        )
        .bind(filter_id.inner_ref())
        .fetch_optional(&self.pool)
        .await
        .ok()
        .flatten()
        .map(|filter| filter.into())
    }

    async fn find_by_user(&self, user_id: &ID) -> Vec<UserFilter> {
        sqlx::query_as::<_, UserFilterRaw>(
            r#"
            SELECT * FROM user_filters
            WHERE user_uid = $1
            "#,
        )
        .bind(user_id.inner_ref())
        .fetch_all(&self.pool)
        .await
        .unwrap_or_default()
        .into_iter()
        .map(|filter| filter.into())
        .collect()
    }

    async fn delete(&self, filter_id: &ID) -> Option<UserFilter> {
        sqlx::query_as::<_, UserFilterRaw>(
            r#"
            DELETE FROM user_filters
            WHERE filter_uid = $1
            RETURNING *
            "#,
        )
        .bind(filter_id.inner_ref())
        .fetch_optional(&self.pool)
        .await
        .ok()
        .flatten()
        .map(|filter| filter.into())
    }
}
