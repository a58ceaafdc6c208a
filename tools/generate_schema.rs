//! JSON Schema + Markdown生成ツール
//!
//! src/domain/config.rsの設定構造から以下を自動生成します：
//! 1. JSON Schema (schema/config.json)
//! 2. Markdownドキュメント (CONFIGURATION.md)
//!
//! 実行方法:
//! ```
//! cargo run --bin generate_schema
//! ```

use schemars::schema_for;
use serde_json::{Map, Value};
use std::fs;
use JazzHands::domain::config::AppConfig;

fn main() {
    println!("JSON Schema + Markdown生成中...");

    // AppConfigからJSON Schemaを生成
    let schema = schema_for!(AppConfig);

    let json = serde_json::to_string_pretty(&schema).expect("Failed to serialize schema to JSON");

    fs::create_dir_all("schema").expect("Failed to create schema/ directory");
    fs::write("schema/config.json", json.clone()).expect("Failed to write schema/config.json");
    println!("  ✓ schema/config.json");

    let schema_value: Value =
        serde_json::from_str(&json).expect("Failed to parse generated schema");
    let markdown = generate_markdown(&schema_value);

    fs::write("CONFIGURATION.md", markdown).expect("Failed to write CONFIGURATION.md");
    println!("  ✓ CONFIGURATION.md");

    println!("✅ 生成完了: schema/config.json + CONFIGURATION.md");
}

/// JSON Schemaからマークダウンドキュメントを生成
fn generate_markdown(schema: &Value) -> String {
    let mut md = String::new();

    md.push_str("# 設定リファレンス (Configuration Reference)\n\n");
    md.push_str("## 概要\n\n");
    md.push_str("`config.toml`ファイルは、JazzHandsの動作を制御する設定ファイルです。\n\n");
    md.push_str("**設定ファイルの場所**: `config.toml` (プロジェクトルート)  \n");
    md.push_str("**スキーマファイル**: `schema/config.json` (自動生成)  \n");
    md.push_str("**サンプル**: `config.toml.example`\n\n");
    md.push_str("⚠️ **注意**: このドキュメント（CONFIGURATION.md）は `cargo run --bin generate_schema` で自動生成されます。\n");
    md.push_str("設定項目の説明を変更する場合は、`src/domain/config.rs`のdoc commentsを編集してください。\n\n");
    md.push_str("## 設定項目\n\n");

    let defs = schema
        .get("$defs")
        .and_then(|d| d.as_object())
        .cloned()
        .unwrap_or_default();

    if let Some(props) = schema.get("properties").and_then(|p| p.as_object()) {
        for (key, prop) in props {
            generate_property_section(&mut md, key, prop, &defs);
        }
    }

    md
}

/// プロパティセクションを生成
fn generate_property_section(
    md: &mut String,
    key: &str,
    schema: &Value,
    defs: &Map<String, Value>,
) {
    md.push_str(&format!("### [{}] - {}\n\n", key, format_section_name(key)));

    if let Some(desc) = schema.get("description") {
        md.push_str(&format!("{}\n\n", desc.as_str().unwrap_or("")));
    }

    // $refの場合、定義を取得
    if let Some(ref_str) = schema.get("$ref").and_then(|r| r.as_str()) {
        if let Some(def_name) = ref_str.strip_prefix("#/$defs/") {
            if let Some(def_schema) = defs.get(def_name) {
                generate_properties_table(md, def_schema, defs);
            }
        }
    }

    if schema.get("properties").is_some() {
        generate_properties_table(md, schema, defs);
    }
}

/// プロパティテーブルを生成
fn generate_properties_table(md: &mut String, schema: &Value, defs: &Map<String, Value>) {
    let Some(props) = schema.get("properties").and_then(|p| p.as_object()) else {
        return;
    };
    if props.is_empty() {
        return;
    }

    md.push_str("| 設定項目 | 型 | 説明 |\n");
    md.push_str("|---------|-----|---------|\n");

    for (prop_key, prop_schema) in props {
        let type_str = get_type_string(prop_schema, defs).replace('|', "\\|");
        let description = get_description(prop_schema);
        md.push_str(&format!("| `{}` | {} | {} |\n", prop_key, type_str, description));
    }
    md.push('\n');

    // ネストされたオブジェクト（$ref を持つプロパティ）をサブセクションとして処理
    for (prop_key, prop_schema) in props {
        if let Some(ref_str) = prop_schema.get("$ref").and_then(|r| r.as_str()) {
            if let Some(def_name) = ref_str.strip_prefix("#/$defs/") {
                if let Some(def_schema) = defs.get(def_name) {
                    if def_schema.get("properties").is_some() {
                        md.push_str(&format!(
                            "#### [{}] - {}\n\n",
                            prop_key,
                            format_section_name(prop_key)
                        ));
                        if let Some(desc) = def_schema.get("description") {
                            md.push_str(&format!("{}\n\n", desc.as_str().unwrap_or("")));
                        }
                        generate_properties_table(md, def_schema, defs);
                    }
                }
            }
        }
    }
}

/// 型を文字列で取得
fn get_type_string(schema: &Value, defs: &Map<String, Value>) -> String {
    if let Some(ref_str) = schema.get("$ref").and_then(|r| r.as_str()) {
        if let Some(def_name) = ref_str.strip_prefix("#/$defs/") {
            if let Some(def_schema) = defs.get(def_name) {
                if def_schema.get("enum").is_some() {
                    return "enum".to_string();
                }
                if def_schema.get("type").and_then(|t| t.as_str()) == Some("object") {
                    return "object".to_string();
                }
                return def_name.to_string();
            }
        }
    }

    if schema.get("enum").and_then(|e| e.as_array()).map(|a| !a.is_empty()) == Some(true) {
        return "enum".to_string();
    }

    match schema.get("type") {
        Some(Value::String(type_str)) => type_str.clone(),
        Some(Value::Array(types)) => {
            let type_strs: Vec<String> = types
                .iter()
                .filter_map(|t| t.as_str())
                .filter(|s| *s != "null")
                .map(|s| s.to_string())
                .collect();
            if type_strs.is_empty() {
                "unknown".to_string()
            } else if types.iter().any(|t| t.as_str() == Some("null")) {
                format!("{} | null", type_strs.join(" | "))
            } else {
                type_strs.join(" | ")
            }
        }
        _ => "unknown".to_string(),
    }
}

/// 説明文を取得
fn get_description(schema: &Value) -> String {
    if let Some(desc_str) = schema.get("description").and_then(|d| d.as_str()) {
        return desc_str
            .replace("\n\n", "<br><br>")
            .replace('\n', " ")
            .replace('|', "\\|");
    }

    if let Some(enum_vals) = schema.get("enum").and_then(|e| e.as_array()) {
        let vals: Vec<String> = enum_vals
            .iter()
            .filter_map(|v| v.as_str().map(|s| format!("`{}`", s)))
            .collect();
        if !vals.is_empty() {
            return format!("値: {}", vals.join(", "));
        }
    }

    "-".to_string()
}

/// セクション名をフォーマット
fn format_section_name(key: &str) -> String {
    match key {
        "segmenter" => "セグメンテーション設定".to_string(),
        "features" => "特徴抽出設定".to_string(),
        "dataset" => "データセット構築設定".to_string(),
        "trainer" => "モデル学習設定".to_string(),
        "live" => "ライブ分類設定".to_string(),
        "actions" => "アクション対応表".to_string(),
        "skin_band" => "肌色クロマ帯域".to_string(),
        "roi" => "ROI設定".to_string(),
        _ => key.to_string(),
    }
}
