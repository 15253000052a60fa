use reqwest::{Client, Response, StatusCode};

use crate::error::RemoteError;
use crate::models::{User, UserId};
use crate::remote::UserSource;
use crate::remote::models::UserPayload;

/// 基于 reqwest 的远程用户 API 客户端
#[derive(Debug, Clone)]
pub struct HttpUserApi {
    client: Client,
    base_url: String,
}

impl HttpUserApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

/// 404 视为不存在，其他非 2xx 状态转为错误
fn check(response: Response) -> Result<Option<Response>, RemoteError> {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Ok(None);
    }
    if !status.is_success() {
        return Err(RemoteError::Status(status.as_u16()));
    }
    Ok(Some(response))
}

impl UserSource for HttpUserApi {
    async fn fetch(&self, id: UserId) -> Result<Option<User>, RemoteError> {
        tracing::debug!("GET users/{}", id);
        let response = self.client.get(self.url(&format!("users/{id}"))).send().await?;

        match check(response)? {
            Some(response) => Ok(Some(response.json::<UserPayload>().await?.into())),
            None => Ok(None),
        }
    }

    async fn fetch_all(&self) -> Result<Vec<User>, RemoteError> {
        tracing::debug!("GET users");
        let response = self.client.get(self.url("users")).send().await?;

        match check(response)? {
            Some(response) => {
                let payloads = response.json::<Vec<UserPayload>>().await?;
                Ok(payloads.into_iter().map(User::from).collect())
            }
            None => Err(RemoteError::Status(StatusCode::NOT_FOUND.as_u16())),
        }
    }

    async fn create(&self, user: &User) -> Result<User, RemoteError> {
        tracing::debug!("POST users");
        let response = self
            .client
            .post(self.url("users"))
            .json(&UserPayload::from(user))
            .send()
            .await?;

        match check(response)? {
            Some(response) => Ok(response.json::<UserPayload>().await?.into()),
            None => Err(RemoteError::Status(StatusCode::NOT_FOUND.as_u16())),
        }
    }

    async fn update(&self, id: UserId, user: &User) -> Result<Option<User>, RemoteError> {
        tracing::debug!("PUT users/{}", id);
        let response = self
            .client
            .put(self.url(&format!("users/{id}")))
            .json(&UserPayload::from(&user.with_id(id)))
            .send()
            .await?;

        match check(response)? {
            Some(response) => Ok(Some(response.json::<UserPayload>().await?.into())),
            None => Ok(None),
        }
    }

    async fn delete(&self, id: UserId) -> Result<Option<User>, RemoteError> {
        let Some(existing) = self.fetch(id).await? else {
            return Ok(None);
        };

        tracing::debug!("DELETE users/{}", id);
        let response = self
            .client
            .delete(self.url(&format!("users/{id}")))
            .send()
            .await?;

        match check(response)? {
            Some(_) => Ok(Some(existing)),
            None => Ok(None),
        }
    }
}
