use axum::{response::IntoResponse, Json};
use serde_json::{json, Value};

/// Path the document is served from when enabled.
pub const OPENAPI_PATH: &str = "/openapi/v1.json";

const BUILD_VERSION: &str = env!("CARGO_PKG_VERSION");

pub async fn openapi_document() -> impl IntoResponse {
    Json(document())
}

fn key_parameter(resource: &str) -> Value {
    json!({
        "name": "key",
        "in": "path",
        "required": true,
        "description": format!("{resource} id (UUID) or slug"),
        "schema": { "type": "string" }
    })
}

fn query_parameter(name: &str, schema: Value, description: &str) -> Value {
    json!({
        "name": name,
        "in": "query",
        "required": false,
        "description": description,
        "schema": schema
    })
}

fn ok(schema: Value) -> Value {
    json!({
        "description": "OK",
        "content": { "application/json": { "schema": schema } }
    })
}

fn problem(description: &str) -> Value {
    json!({
        "description": description,
        "content": {
            "application/problem+json": {
                "schema": { "$ref": "#/components/schemas/Problem" }
            }
        }
    })
}

fn document() -> Value {
    let schema_ref = |name: &str| json!({ "$ref": format!("#/components/schemas/{name}") });
    let array_of = |name: &str| json!({ "type": "array", "items": schema_ref(name) });

    json!({
        "openapi": "3.0.3",
        "info": { "title": "Garage catalog API", "version": BUILD_VERSION },
        "paths": {
            "/api/categories": {
                "get": {
                    "operationId": "listCategories",
                    "responses": {
                        "200": ok(array_of("Category")),
                        "500": problem("Catalog store unavailable")
                    }
                }
            },
            "/api/categories/{key}": {
                "get": {
                    "operationId": "getCategory",
                    "parameters": [key_parameter("Category")],
                    "responses": {
                        "200": ok(schema_ref("Category")),
                        "404": problem("Unknown category"),
                        "500": problem("Catalog store unavailable")
                    }
                }
            },
            "/api/products": {
                "get": {
                    "operationId": "listProducts",
                    "parameters": [
                        query_parameter(
                            "offset",
                            json!({ "type": "integer", "minimum": 0, "default": 0 }),
                            "Rows to skip; negative or malformed values become 0"
                        ),
                        query_parameter(
                            "limit",
                            json!({ "type": "integer", "minimum": 1, "maximum": 100, "default": 10 }),
                            "Page size, clamped to [1, 100]"
                        ),
                        query_parameter(
                            "in_stock",
                            json!({ "type": "boolean" }),
                            "true keeps stock > 0, false keeps stock <= 0"
                        ),
                        query_parameter(
                            "category",
                            json!({ "type": "string" }),
                            "Exact category slug"
                        )
                    ],
                    "responses": {
                        "200": ok(array_of("Product")),
                        "500": problem("Catalog store unavailable")
                    }
                }
            },
            "/api/products/{key}": {
                "get": {
                    "operationId": "getProduct",
                    "parameters": [key_parameter("Product")],
                    "responses": {
                        "200": ok(schema_ref("Product")),
                        "404": problem("Unknown product"),
                        "500": problem("Catalog store unavailable")
                    }
                }
            }
        },
        "components": {
            "schemas": {
                "Category": {
                    "type": "object",
                    "required": ["id", "name", "slug"],
                    "properties": {
                        "id": { "type": "string", "format": "uuid" },
                        "name": { "type": "string" },
                        "slug": { "type": "string" }
                    }
                },
                "Product": {
                    "type": "object",
                    "required": [
                        "id", "title", "slug", "description", "year", "price",
                        "stock", "discount", "discountUnit", "category"
                    ],
                    "properties": {
                        "id": { "type": "string", "format": "uuid" },
                        "title": { "type": "string" },
                        "slug": { "type": "string" },
                        "description": { "type": "string" },
                        "year": { "type": "integer" },
                        "imageUrl": { "type": "string", "nullable": true },
                        "price": { "type": "number" },
                        "stock": { "type": "integer" },
                        "discount": { "type": "number" },
                        "discountUnit": { "type": "string", "enum": ["percent", "fraction"] },
                        "category": {
                            "allOf": [schema_ref("Category")],
                            "nullable": true
                        }
                    }
                },
                "Problem": {
                    "type": "object",
                    "properties": {
                        "type": { "type": "string" },
                        "title": { "type": "string" },
                        "detail": { "type": "string" }
                    }
                }
            }
        }
    })
}
