use crate::http::{ApiClient, ApiError, RequestOptions};
use crate::types::{ApiResponse, CreateEventRequest, Event, EventPage};

#[tracing::instrument(skip(api, event), fields(title = %event.event_title))]
pub async fn create_event(
    api: &ApiClient,
    event: &CreateEventRequest,
) -> Result<ApiResponse<Event>, ApiError> {
    api.post("/event/create-event", Some(event), RequestOptions::new())
        .await
}

#[tracing::instrument(skip(api))]
pub async fn all_events(api: &ApiClient) -> Result<ApiResponse<EventPage>, ApiError> {
    api.get("/event/all-events", RequestOptions::new()).await
}

#[tracing::instrument(skip(api))]
pub async fn event_by_id(api: &ApiClient, event_id: &str) -> Result<ApiResponse<Event>, ApiError> {
    api.get(&format!("/event/{}", event_id), RequestOptions::new())
        .await
}

#[tracing::instrument(skip(api))]
pub async fn register_for_event(
    api: &ApiClient,
    event_id: &str,
) -> Result<ApiResponse<Event>, ApiError> {
    api.post::<_, ()>(
        &format!("/event/register/{}", event_id),
        None,
        RequestOptions::new(),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::TokenStore;
    use crate::types::EventStatus;
    use mockito::Matcher;
    use serde_json::json;

    fn signed_in(url: &str) -> ApiClient {
        let api = ApiClient::new(url, TokenStore::in_memory()).unwrap();
        api.set_access_token("abc");
        api
    }

    const EVENT: &str = r#"{
        "_id": "e1",
        "eventType": "meetup",
        "eventTitle": "Rust Night",
        "description": "Talks and pizza",
        "date": "2026-11-01T18:00:00Z",
        "image": "",
        "registeredUsers": ["u1"],
        "status": "upcoming",
        "createdBy": "u9"
    }"#;

    #[tokio::test]
    async fn test_all_events() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/event/all-events")
            .match_header("authorization", "Bearer abc")
            .with_status(200)
            .with_body(format!(
                r#"{{"success": true, "msg": "ok", "data": {{"docs": [{}], "pagination": {{"totalDocs": 1}}}}}}"#,
                EVENT
            ))
            .create_async()
            .await;

        let api = signed_in(&server.url());
        let response = all_events(&api).await.unwrap();

        mock.assert_async().await;
        assert_eq!(response.data.docs.len(), 1);
        assert_eq!(response.data.docs[0].event_title, "Rust Night");
        assert_eq!(response.data.docs[0].status, EventStatus::Upcoming);
    }

    #[tokio::test]
    async fn test_event_by_id() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/event/e1")
            .with_status(200)
            .with_body(format!(r#"{{"success": true, "msg": "ok", "data": {}}}"#, EVENT))
            .create_async()
            .await;

        let api = signed_in(&server.url());
        let response = event_by_id(&api, "e1").await.unwrap();

        mock.assert_async().await;
        assert_eq!(response.data.id, "e1");
        assert!(response.data.is_registered("u1"));
    }

    #[tokio::test]
    async fn test_event_by_id_not_found() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/event/missing")
            .with_status(404)
            .with_body(r#"{"success": false, "msg": "Event not found"}"#)
            .create_async()
            .await;

        let api = signed_in(&server.url());
        let err = event_by_id(&api, "missing").await.unwrap_err();
        assert_eq!(err.msg, "Event not found");
    }

    #[tokio::test]
    async fn test_create_event() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/event/create-event")
            .match_body(Matcher::Json(json!({
                "eventType": "meetup",
                "eventTitle": "Rust Night",
                "description": "Talks and pizza",
                "date": "2026-11-01T18:00:00Z"
            })))
            .with_status(201)
            .with_body(format!(r#"{{"success": true, "msg": "Created", "data": {}}}"#, EVENT))
            .create_async()
            .await;

        let api = signed_in(&server.url());
        let response = create_event(
            &api,
            &CreateEventRequest {
                event_type: "meetup".to_string(),
                event_title: "Rust Night".to_string(),
                description: "Talks and pizza".to_string(),
                date: "2026-11-01T18:00:00Z".to_string(),
            },
        )
        .await
        .unwrap();

        mock.assert_async().await;
        assert_eq!(response.msg, "Created");
    }

    #[tokio::test]
    async fn test_register_for_event() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/event/register/e1")
            .match_header("authorization", "Bearer abc")
            .with_status(200)
            .with_body(format!(r#"{{"success": true, "msg": "Registered", "data": {}}}"#, EVENT))
            .create_async()
            .await;

        let api = signed_in(&server.url());
        let response = register_for_event(&api, "e1").await.unwrap();

        mock.assert_async().await;
        assert_eq!(response.msg, "Registered");
    }
}
