use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use uuid::Uuid;

use quill_types::api::{
    AnalyticsResponse, CommentResponse, ErrorBody, LikesResponse, LoginResponse, MeResponse,
    MessageResponse, PostResponse, PostStatusResponse, RegisterResponse, SaveResponse,
    SuggestTagsResponse, TagResponse, UserResponse,
};
use quill_types::models::PostStatus;

use crate::error::{ClientError, ClientResult};

/// A cover image to attach to a post form.
#[derive(Debug, Clone)]
pub struct CoverImage {
    pub data: Vec<u8>,
    pub file_name: String,
    pub content_type: String,
}

/// Fields for creating or editing a post. On edit, `None` keeps the stored
/// value.
#[derive(Debug, Clone, Default)]
pub struct PostDraft {
    pub title: Option<String>,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
    pub status: Option<PostStatus>,
    pub cover: Option<CoverImage>,
}

impl PostDraft {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            content: Some(content.into()),
            ..Self::default()
        }
    }

    fn into_form(self) -> ClientResult<Form> {
        let mut form = Form::new();
        if let Some(title) = self.title {
            form = form.text("title", title);
        }
        if let Some(content) = self.content {
            form = form.text("content", content);
        }
        if let Some(tags) = self.tags {
            form = form.text("tags", tags.join(","));
        }
        if let Some(status) = self.status {
            form = form.text("status", status.as_str());
        }
        if let Some(cover) = self.cover {
            let part = Part::bytes(cover.data)
                .file_name(cover.file_name)
                .mime_str(&cover.content_type)?;
            form = form.part("coverImage", part);
        }
        Ok(form)
    }
}

/// Typed wrapper over the `/api` surface.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    http: Client,
}

impl ApiClient {
    /// `base_url` is the server root, e.g. `http://localhost:5000`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    pub fn with_client(base_url: impl Into<String>, http: Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, http }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str, token: Option<&str>) -> RequestBuilder {
        let req = self
            .http
            .request(method, format!("{}/api{}", self.base_url, path));
        match token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn send<T: DeserializeOwned>(req: RequestBuilder) -> ClientResult<T> {
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let message = match resp.json::<ErrorBody>().await {
                Ok(body) => body.message,
                Err(_) => status.canonical_reason().unwrap_or("Request failed").to_string(),
            };
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(resp.json().await?)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
    ) -> ClientResult<T> {
        Self::send(self.request(method, path, token)).await
    }

    async fn call_json<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: &B,
    ) -> ClientResult<T> {
        Self::send(self.request(method, path, token).json(body)).await
    }

    // -- Auth --

    pub async fn register(&self, name: &str, email: &str, password: &str) -> ClientResult<UserResponse> {
        let body = json!({ "name": name, "email": email, "password": password });
        let resp: RegisterResponse = self
            .call_json(Method::POST, "/auth/register", None, &body)
            .await?;
        Ok(resp.user)
    }

    pub async fn login(&self, email: &str, password: &str) -> ClientResult<LoginResponse> {
        let body = json!({ "email": email, "password": password });
        self.call_json(Method::POST, "/auth/login", None, &body).await
    }

    pub async fn me(&self, token: &str) -> ClientResult<UserResponse> {
        let resp: MeResponse = self.call(Method::GET, "/auth/me", Some(token)).await?;
        Ok(resp.user)
    }

    pub async fn change_password(&self, token: &str, old: &str, new: &str) -> ClientResult<MessageResponse> {
        let body = json!({ "oldPassword": old, "newPassword": new });
        self.call_json(Method::PUT, "/users/change-password", Some(token), &body)
            .await
    }

    // -- Posts --

    pub async fn list_posts(&self, token: &str) -> ClientResult<Vec<PostResponse>> {
        self.call(Method::GET, "/posts", Some(token)).await
    }

    pub async fn search_posts(&self, query: Option<&str>, tags: &[&str]) -> ClientResult<Vec<PostResponse>> {
        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(query) = query {
            params.push(("query", query.to_string()));
        }
        if !tags.is_empty() {
            params.push(("tags", tags.join(",")));
        }
        Self::send(self.request(Method::GET, "/posts/search", None).query(&params)).await
    }

    pub async fn get_post(&self, id: Uuid) -> ClientResult<PostResponse> {
        self.call(Method::GET, &format!("/posts/{}", id), None).await
    }

    pub async fn create_post(&self, token: &str, draft: PostDraft) -> ClientResult<PostResponse> {
        let form = draft.into_form()?;
        Self::send(self.request(Method::POST, "/posts", Some(token)).multipart(form)).await
    }

    pub async fn update_post(&self, token: &str, id: Uuid, draft: PostDraft) -> ClientResult<PostResponse> {
        let form = draft.into_form()?;
        Self::send(
            self.request(Method::PUT, &format!("/posts/{}", id), Some(token))
                .multipart(form),
        )
        .await
    }

    pub async fn delete_post(&self, token: &str, id: Uuid) -> ClientResult<MessageResponse> {
        self.call(Method::DELETE, &format!("/posts/{}", id), Some(token))
            .await
    }

    pub async fn set_post_status(&self, token: &str, id: Uuid, status: PostStatus) -> ClientResult<PostStatusResponse> {
        let body = json!({ "status": status });
        self.call_json(Method::PUT, &format!("/posts/{}/status", id), Some(token), &body)
            .await
    }

    pub async fn report_post(&self, token: &str, id: Uuid) -> ClientResult<MessageResponse> {
        self.call(Method::POST, &format!("/posts/{}/report", id), Some(token))
            .await
    }

    // -- Likes --

    pub async fn like(&self, token: &str, id: Uuid) -> ClientResult<PostResponse> {
        self.call(Method::PUT, &format!("/posts/{}/like", id), Some(token))
            .await
    }

    pub async fn unlike(&self, token: &str, id: Uuid) -> ClientResult<PostResponse> {
        self.call(Method::DELETE, &format!("/posts/{}/like", id), Some(token))
            .await
    }

    pub async fn toggle_like(&self, token: &str, id: Uuid) -> ClientResult<PostResponse> {
        self.call(Method::POST, &format!("/posts/{}/like", id), Some(token))
            .await
    }

    pub async fn likes(&self, id: Uuid) -> ClientResult<LikesResponse> {
        self.call(Method::GET, &format!("/posts/{}/like", id), None).await
    }

    // -- Saves --

    pub async fn save(&self, token: &str, id: Uuid) -> ClientResult<SaveResponse> {
        self.call(Method::POST, &format!("/posts/{}/saved", id), Some(token))
            .await
    }

    pub async fn unsave(&self, token: &str, id: Uuid) -> ClientResult<SaveResponse> {
        self.call(Method::DELETE, &format!("/posts/{}/saved", id), Some(token))
            .await
    }

    pub async fn toggle_save(&self, token: &str, id: Uuid) -> ClientResult<SaveResponse> {
        self.call(Method::PUT, &format!("/posts/{}/save", id), Some(token))
            .await
    }

    pub async fn saved_posts(&self, token: &str) -> ClientResult<Vec<PostResponse>> {
        self.call(Method::GET, "/posts/saved", Some(token)).await
    }

    // -- Comments --

    pub async fn comments(&self, post_id: Uuid) -> ClientResult<Vec<CommentResponse>> {
        self.call(Method::GET, &format!("/comments/post/{}", post_id), None)
            .await
    }

    pub async fn add_comment(&self, token: &str, post_id: Uuid, content: &str) -> ClientResult<CommentResponse> {
        let body = json!({ "content": content });
        self.call_json(Method::POST, &format!("/comments/post/{}", post_id), Some(token), &body)
            .await
    }

    pub async fn edit_comment(&self, token: &str, id: Uuid, content: &str) -> ClientResult<CommentResponse> {
        let body = json!({ "content": content });
        self.call_json(Method::PUT, &format!("/comments/{}", id), Some(token), &body)
            .await
    }

    pub async fn delete_comment(&self, token: &str, id: Uuid) -> ClientResult<MessageResponse> {
        self.call(Method::DELETE, &format!("/comments/{}", id), Some(token))
            .await
    }

    // -- Tags --

    pub async fn tags(&self, token: &str) -> ClientResult<Vec<TagResponse>> {
        self.call(Method::GET, "/users/tags", Some(token)).await
    }

    // -- AI --

    pub async fn generate_post(&self, token: &str, topic: &str) -> ClientResult<PostResponse> {
        let body = json!({ "topic": topic });
        self.call_json(Method::POST, "/ai/generate-post", Some(token), &body)
            .await
    }

    pub async fn suggest_tags(&self, token: &str, content: &str) -> ClientResult<Vec<String>> {
        let body = json!({ "content": content });
        let resp: SuggestTagsResponse = self
            .call_json(Method::POST, "/ai/suggest-tags", Some(token), &body)
            .await?;
        Ok(resp.tags)
    }

    // -- Admin --

    pub async fn list_users(&self, token: &str) -> ClientResult<Vec<UserResponse>> {
        self.call(Method::GET, "/admin/users", Some(token)).await
    }

    pub async fn analytics(&self, token: &str) -> ClientResult<AnalyticsResponse> {
        self.call(Method::GET, "/admin/analytics", Some(token)).await
    }
}
