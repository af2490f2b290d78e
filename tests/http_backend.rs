use std::time::Duration;
use actix_multipart::Multipart;
use actix_web::{web, App, HttpResponse, HttpServer};
use futures::TryStreamExt;
use serde_json::{json, Value};
use FullseePathway::analysis::backend::{AnalysisBackend, BackendError, BackendReply, HttpBackend, JobRequest};
use FullseePathway::analysis::pages::Encoding;
use FullseePathway::analysis::params::ParamBundle;

async fn echo_json(body: web::Json<Value>) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "message": "json received",
        "stdout": body.to_string(),
    }))
}

async fn echo_form(body: web::Form<Vec<(String, String)>>) -> HttpResponse {
    let pairs: Vec<String> = body
        .into_inner()
        .into_iter()
        .map(|(name, value)| format!("{}={}", name, value))
        .collect();
    HttpResponse::Ok().json(json!({ "message": pairs.join("&") }))
}

async fn zip_reply() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("application/zip")
        .body(vec![0x50, 0x4b, 0x05, 0x06])
}

async fn failing() -> HttpResponse {
    HttpResponse::InternalServerError().body("R script failed")
}

async fn receive_csv(mut payload: Multipart) -> Result<HttpResponse, actix_web::Error> {
    let mut file_name = String::new();
    let mut target_dir = String::new();
    let mut size = 0;

    while let Some(mut field) = payload.try_next().await? {
        let name = field.content_disposition().get_name().unwrap_or_default().to_string();
        if let Some(file) = field.content_disposition().get_filename() {
            file_name = file.to_string();
        }
        let mut bytes = Vec::new();
        while let Some(chunk) = field.try_next().await? {
            bytes.extend_from_slice(&chunk);
        }
        match name.as_str() {
            "file" => size = bytes.len(),
            "target_dir" => target_dir = String::from_utf8_lossy(&bytes).into_owned(),
            _ => {}
        }
    }
    Ok(HttpResponse::Ok().body(format!("{} ({} bytes) -> {}", file_name, size, target_dir)))
}

fn start_service() -> String {
    let server = HttpServer::new(|| {
        App::new()
            .route("/api/json/", web::post().to(echo_json))
            .route("/api/form/", web::post().to(echo_form))
            .route("/api/zip/", web::post().to(zip_reply))
            .route("/api/fail/", web::post().to(failing))
            .route("/api/upload-csv/", web::post().to(receive_csv))
    })
    .workers(1)
    .bind("127.0.0.1:0")
    .unwrap();
    let addr = server.addrs()[0];
    actix_web::rt::spawn(server.run());
    format!("http://{}", addr)
}

fn request(url: String, body: ParamBundle, encoding: Encoding) -> JobRequest {
    JobRequest {
        url,
        body,
        encoding,
        timeout: Some(Duration::from_secs(10)),
    }
}

fn sample_bundle() -> ParamBundle {
    let mut bundle = ParamBundle::new();
    bundle.insert("fc_cutoff", 1.5);
    bundle.insert("plot_type", "volcano");
    bundle
}

#[actix_web::test]
async fn json_pages_post_a_json_body() {
    let base = start_service();
    let backend = HttpBackend::new().unwrap();

    let reply = backend
        .submit(request(format!("{}/api/json/", base), sample_bundle(), Encoding::Json))
        .await
        .unwrap();

    match reply {
        BackendReply::Message { message, stdout, .. } => {
            assert_eq!(message.as_deref(), Some("json received"));
            let echoed: Value = serde_json::from_str(&stdout.unwrap()).unwrap();
            assert_eq!(echoed["fc_cutoff"], 1.5);
            assert_eq!(echoed["plot_type"], "volcano");
        }
        other => panic!("unexpected reply {:?}", other),
    }
}

#[actix_web::test]
async fn form_pages_post_urlencoded_fields() {
    let base = start_service();
    let backend = HttpBackend::new().unwrap();

    let reply = backend
        .submit(request(format!("{}/api/form/", base), sample_bundle(), Encoding::Form))
        .await
        .unwrap();

    match reply {
        BackendReply::Message { message, .. } => {
            let message = message.unwrap();
            assert!(message.contains("fc_cutoff=1.5"));
            assert!(message.contains("plot_type=volcano"));
        }
        other => panic!("unexpected reply {:?}", other),
    }
}

#[actix_web::test]
async fn binary_reply_is_a_payload() {
    let base = start_service();
    let backend = HttpBackend::new().unwrap();

    let reply = backend
        .submit(request(format!("{}/api/zip/", base), ParamBundle::new(), Encoding::Json))
        .await
        .unwrap();

    assert_eq!(reply, BackendReply::Payload(vec![0x50, 0x4b, 0x05, 0x06]));
}

#[actix_web::test]
async fn non_ok_status_carries_the_body() {
    let base = start_service();
    let backend = HttpBackend::new().unwrap();

    let error = backend
        .submit(request(format!("{}/api/fail/", base), ParamBundle::new(), Encoding::Json))
        .await
        .unwrap_err();

    match error {
        BackendError::Status { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "R script failed");
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[actix_web::test]
async fn unreachable_service_is_a_connection_error() {
    let backend = HttpBackend::new().unwrap();

    let error = backend
        .submit(request("http://127.0.0.1:9/api/deg/".to_string(), ParamBundle::new(), Encoding::Form))
        .await
        .unwrap_err();

    assert!(matches!(error, BackendError::Connection { .. }));
}

#[actix_web::test]
async fn csv_is_forwarded_as_multipart() {
    let base = start_service();
    let backend = HttpBackend::new().unwrap();

    let answer = backend
        .forward_csv(
            &format!("{}/api/upload-csv/", base),
            "counts.csv",
            b"gene,s1\nTP53,4\n".to_vec(),
            "/data/default/csv-files",
        )
        .await
        .unwrap();

    assert_eq!(answer, "counts.csv (15 bytes) -> /data/default/csv-files");
}
