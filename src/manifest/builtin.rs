// Manifests shipped with the host: authentication, core AWS-backed services
// and platform introspection.

use super::error::ManifestError;
use super::schema::{ApplicationManifest, HttpMethod, MenuEntry, ResourceDeclaration, ResourceKind, RouteDefinition};

pub fn auth_manifest() -> Result<ApplicationManifest, ManifestError> {
    Ok(ApplicationManifest::new("auth", "Authentication Service", "1.0.0")
        .route(
            RouteDefinition::new("/api/auth/[...nextauth]", HttpMethod::Get, "auth", "nextauth")?
                .describe("Session lookup"),
        )
        .route(
            RouteDefinition::new("/api/auth/[...nextauth]", HttpMethod::Post, "auth", "nextauth")?
                .describe("Sign-in and sign-out actions"),
        ))
}

pub fn api_manifest() -> Result<ApplicationManifest, ManifestError> {
    let mut manifest = ApplicationManifest::new("api", "Core API Services", "1.0.0");

    for (operation, description) in [
        ("scan", "Scan DynamoDB table"),
        ("query", "Query DynamoDB table"),
        ("get", "Get item from DynamoDB"),
        ("put", "Put item to DynamoDB"),
        ("update", "Update DynamoDB item"),
        ("delete", "Delete DynamoDB item"),
    ] {
        let path = format!("/api/dynamo/{}", operation);
        manifest = manifest.route(
            RouteDefinition::new(&path, HttpMethod::Post, "dynamo", operation)?
                .secure()
                .describe(description),
        );
    }

    for (path, method, service, operation, description) in [
        ("/api/chat/send", HttpMethod::Post, "chat", "send", "Send chat message"),
        ("/api/chat/history", HttpMethod::Get, "chat", "history", "Get chat history"),
        ("/api/chat/llm", HttpMethod::Post, "chat", "llm", "Send prompt to language model"),
        ("/api/s3/upload", HttpMethod::Post, "s3", "upload", "Upload file to S3"),
        ("/api/s3/download", HttpMethod::Get, "s3", "download", "Download file from S3"),
        ("/api/neptune/query", HttpMethod::Post, "neptune", "query", "Query Neptune graph"),
    ] {
        manifest = manifest.route(
            RouteDefinition::new(path, method, service, operation)?
                .secure()
                .describe(description),
        );
    }

    Ok(manifest
        .route(
            RouteDefinition::new("/api/captify", HttpMethod::Post, "captify", "request")?
                .secure()
                .describe("Resource-keyed request routed through the resource handler registry"),
        )
        .resource(ResourceDeclaration {
            kind: ResourceKind::DynamodbTable,
            name: "captify-core-user".to_string(),
            resource_type: Some("users".to_string()),
            description: "Platform user profiles".to_string(),
        })
        .resource(ResourceDeclaration {
            kind: ResourceKind::DynamodbTable,
            name: "captify-core-app".to_string(),
            resource_type: Some("applications".to_string()),
            description: "Installed application records".to_string(),
        }))
}

pub fn platform_manifest() -> Result<ApplicationManifest, ManifestError> {
    Ok(ApplicationManifest::new("platform", "Platform Registry", "1.0.0")
        .route(
            RouteDefinition::new("/api/platform/manifests", HttpMethod::Get, "platform", "manifests")?
                .describe("Installed manifests and the caller's menu"),
        )
        .route(
            RouteDefinition::new("/api/platform/routes", HttpMethod::Get, "platform", "routes")?
                .secure()
                .roles(["admin"])
                .describe("Aggregated route table"),
        )
        .menu_entry(MenuEntry {
            id: "home".to_string(),
            label: "Home".to_string(),
            href: "/app/core/home".to_string(),
            icon: Some("home".to_string()),
            order: 0,
            roles: Vec::new(),
        })
        .menu_entry(MenuEntry {
            id: "admin".to_string(),
            label: "Administration".to_string(),
            href: "/app/admin/home".to_string(),
            icon: Some("shield".to_string()),
            order: 90,
            roles: vec!["admin".to_string()],
        }))
}

/// Host-provided manifests in registration order
pub fn builtin_manifests() -> Result<Vec<ApplicationManifest>, ManifestError> {
    Ok(vec![auth_manifest()?, api_manifest()?, platform_manifest()?])
}
