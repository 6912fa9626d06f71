use nudge_infra::NudgeContext;
use std::fmt::Debug;
use tracing::error;

#[async_trait::async_trait]
pub trait UseCase: Debug + Send {
    type Response: Send;
    type Error: Send;

    /// UseCase name identifier
    const NAME: &'static str;

    async fn execute(&mut self, ctx: &NudgeContext) -> Result<Self::Response, Self::Error>;
}

/// Runs the given usecase and logs the error if it fails
#[tracing::instrument(name = "Executing usecase", skip(usecase, ctx), fields(usecase = %U::NAME))]
pub async fn execute<U>(mut usecase: U, ctx: &NudgeContext) -> Result<U::Response, U::Error>
where
    U: UseCase,
    U::Error: Debug,
{
    let res = usecase.execute(ctx).await;

    if let Err(e) = &res {
        error!("Use case {} error: {:?}", U::NAME, e);
    }

    res
}
