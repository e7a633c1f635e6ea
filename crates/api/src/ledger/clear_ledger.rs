use crate::error::ClasswatchError;
use crate::shared::usecase::UseCase;
use classwatch_domain::ID;
use classwatch_infra::ClasswatchContext;

/// Forget what the ledger knows for a user: one (user, instance) pair when
/// `instance_key` is given, everything otherwise. The only sanctioned way an
/// already-notified instance can ever notify again.
#[derive(Debug)]
pub struct ClearLedgerUseCase {
    pub user_id: ID,
    pub instance_key: Option<String>,
}

#[derive(Debug)]
pub enum UseCaseError {
    UserNotFound(ID),
    EntryNotFound(ID, String),
    StorageError,
}

impl From<UseCaseError> for ClasswatchError {
    fn from(e: UseCaseError) -> Self {
        match e {
            UseCaseError::UserNotFound(user_id) => {
                Self::NotFound(format!("The user with id: {}, was not found.", user_id))
            }
            UseCaseError::EntryNotFound(user_id, instance_key) => Self::NotFound(format!(
                "No ledger entry for user: {} and instance: {}.",
                user_id, instance_key
            )),
            UseCaseError::StorageError => Self::InternalError,
        }
    }
}

#[async_trait::async_trait(?Send)]
impl UseCase for ClearLedgerUseCase {
    type Response = usize;

    type Error = UseCaseError;

    const NAME: &'static str = "ClearLedger";

    async fn execute(&mut self, ctx: &ClasswatchContext) -> Result<Self::Response, Self::Error> {
        let user = match ctx.repos.users.find(&self.user_id).await {
            Some(user) => user,
            None => return Err(UseCaseError::UserNotFound(self.user_id.clone())),
        };

        match &self.instance_key {
            Some(instance_key) => ctx
                .repos
                .ledger
                .clear(&user.id, instance_key)
                .await
                .map(|_| 1)
                .ok_or_else(|| {
                    UseCaseError::EntryNotFound(user.id.clone(), instance_key.clone())
                }),
            None => ctx
                .repos
                .ledger
                .clear_user(&user.id)
                .await
                .map(|res| res.deleted_count as usize)
                .map_err(|_| UseCaseError::StorageError),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::shared::usecase::execute;
    use classwatch_domain::{LedgerEntry, User};
    use classwatch_infra::{
        ClasswatchContext, InMemoryDeliveryChannel, InMemoryUpstreamProvider,
    };
    use std::sync::Arc;

    async fn setup() -> (ClasswatchContext, User) {
        let ctx = ClasswatchContext::create_inmemory(
            Arc::new(InMemoryUpstreamProvider::new()),
            Arc::new(InMemoryDeliveryChannel::new()),
        );
        let user = User::new("chat-1", "jane@example.com");
        ctx.repos.users.insert(&user).await.unwrap();
        ctx.repos
            .ledger
            .commit(&LedgerEntry {
                user_id: user.id.clone(),
                instance_key: "cls-1".into(),
                sent_at: 100,
                instance_start_ts: 200,
            })
            .await
            .unwrap();
        (ctx, user)
    }

    #[actix_rt::test]
    async fn clears_a_single_pair() {
        let (ctx, user) = setup().await;
        let usecase = ClearLedgerUseCase {
            user_id: user.id.clone(),
            instance_key: Some("cls-1".into()),
        };
        assert_eq!(execute(usecase, &ctx).await.unwrap(), 1);
        assert!(ctx.repos.ledger.is_new(&user.id, "cls-1").await.unwrap());
    }

    #[actix_rt::test]
    async fn missing_entry_is_not_found() {
        let (ctx, user) = setup().await;
        let usecase = ClearLedgerUseCase {
            user_id: user.id,
            instance_key: Some("cls-unknown".into()),
        };
        assert!(matches!(
            execute(usecase, &ctx).await,
            Err(UseCaseError::EntryNotFound(_, _))
        ));
    }

    #[actix_rt::test]
    async fn resets_the_whole_user_ledger() {
        let (ctx, user) = setup().await;
        ctx.repos
            .ledger
            .commit(&LedgerEntry {
                user_id: user.id.clone(),
                instance_key: "cls-2".into(),
                sent_at: 100,
                instance_start_ts: 200,
            })
            .await
            .unwrap();

        let usecase = ClearLedgerUseCase {
            user_id: user.id.clone(),
            instance_key: None,
        };
        assert_eq!(execute(usecase, &ctx).await.unwrap(), 2);
        assert!(ctx.repos.ledger.is_new(&user.id, "cls-1").await.unwrap());
        assert!(ctx.repos.ledger.is_new(&user.id, "cls-2").await.unwrap());
    }

    #[actix_rt::test]
    async fn unknown_user_is_not_found() {
        let (ctx, _) = setup().await;
        let usecase = ClearLedgerUseCase {
            user_id: ID::new(),
            instance_key: None,
        };
        assert!(matches!(
            execute(usecase, &ctx).await,
            Err(UseCaseError::UserNotFound(_))
        ));
    }
}
