//! Integration tests for the command line.

use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

fn erd_diagram() -> Command {
    Command::new(env!("CARGO_BIN_EXE_erd-diagram"))
}

const CATALOG: &str = r#"
data_sources:
  - id: shop
    name: Shop DB
    containers:
      - name: public
        tables:
          - name: customers
            columns: [id, name]
            primary_key: [id]
          - name: orders
            columns: [id, customer_id]
            primary_key: [id]
            foreign_keys:
              - name: fk_orders_customer
                columns: [customer_id]
                references: customers
          - name: tmp_orders
            columns: [id]
"#;

fn write_catalog(dir: &Path) -> String {
    let path = dir.join("catalog.yaml");
    fs::write(&path, CATALOG).unwrap();
    path.to_str().unwrap().to_string()
}

#[test]
fn test_build_writes_diagram_file() {
    let temp_dir = TempDir::new().unwrap();
    let catalog = write_catalog(temp_dir.path());
    let output_file = temp_dir.path().join("out").join("shop.erd");

    let output = erd_diagram()
        .args([
            "build",
            &catalog,
            "-r",
            "shop:public",
            "--exclude",
            "tmp_*",
            "-n",
            "Shop",
            "-o",
            output_file.to_str().unwrap(),
        ])
        .output()
        .unwrap();
    assert!(output.status.success(), "Command failed: {:?}", output);

    let xml = fs::read_to_string(&output_file).unwrap();
    assert!(xml.contains(r#"<diagram version="1" name="Shop""#));
    assert!(xml.contains(r#"name="customers""#));
    assert!(xml.contains(r#"name="fk_orders_customer""#));
    assert!(!xml.contains("tmp_orders"));

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Entities: 2"), "stderr: {}", stderr);
    assert!(stderr.contains("Relations: 1"), "stderr: {}", stderr);
}

#[test]
fn test_build_prints_xml_without_output() {
    let temp_dir = TempDir::new().unwrap();
    let catalog = write_catalog(temp_dir.path());

    let output = erd_diagram().args(["build", &catalog]).output().unwrap();
    assert!(output.status.success(), "Command failed: {:?}", output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("<?xml"));
    assert!(stdout.contains("tmp_orders"));
}

#[test]
fn test_inspect_json_summary() {
    let temp_dir = TempDir::new().unwrap();
    let catalog = write_catalog(temp_dir.path());
    let diagram = temp_dir.path().join("shop.erd");

    let build = erd_diagram()
        .args(["build", &catalog, "-o", diagram.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(build.status.success(), "Command failed: {:?}", build);

    let output = erd_diagram()
        .args([
            "inspect",
            diagram.to_str().unwrap(),
            "--catalog",
            &catalog,
            "--json",
        ])
        .output()
        .unwrap();
    assert!(output.status.success(), "Command failed: {:?}", output);

    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["entities"].as_array().unwrap().len(), 3);
    let relations = summary["relations"].as_array().unwrap();
    assert_eq!(relations.len(), 1);
    assert_eq!(relations[0]["name"], "fk_orders_customer");
    assert_eq!(relations[0]["kind"], "physical");
    assert_eq!(relations[0]["from_table"], "orders");
    assert_eq!(relations[0]["to_table"], "customers");
    assert_eq!(summary["needs_layout"], true);
    assert!(summary["diagnostics"].as_array().unwrap().is_empty());
}

#[test]
fn test_inspect_keeps_build_visibility() {
    let temp_dir = TempDir::new().unwrap();
    let catalog = write_catalog(temp_dir.path());
    let diagram = temp_dir.path().join("keys.erd");
    let resaved = temp_dir.path().join("resaved.erd");

    let build = erd_diagram()
        .args(["build", &catalog, "-a", "primary", "-o", diagram.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(build.status.success(), "Command failed: {:?}", build);

    let output = erd_diagram()
        .args([
            "inspect",
            diagram.to_str().unwrap(),
            "--catalog",
            &catalog,
            "--json",
            "-o",
            resaved.to_str().unwrap(),
        ])
        .output()
        .unwrap();
    assert!(output.status.success(), "Command failed: {:?}", output);

    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let attributes: Vec<u64> = summary["entities"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["attributes"].as_u64().unwrap())
        .collect();
    // customers and orders show their id, tmp_orders has no key
    assert_eq!(attributes, vec![1, 1, 0]);
    assert!(fs::read_to_string(&resaved)
        .unwrap()
        .contains(r#"attributes="primary""#));
}

#[test]
fn test_inspect_reports_missing_entities() {
    let temp_dir = TempDir::new().unwrap();
    let catalog = write_catalog(temp_dir.path());
    let diagram = temp_dir.path().join("stale.erd");
    fs::write(
        &diagram,
        r#"<?xml version="1.0" encoding="UTF-8"?>
<diagram version="1">
  <entities>
    <data-source id="shop">
      <entity id="1" name="customers" x="10" y="10"><path name="public"/></entity>
      <entity id="2" name="invoices" x="200" y="10"><path name="public"/></entity>
    </data-source>
  </entities>
</diagram>
"#,
    )
    .unwrap();
    let resaved = temp_dir.path().join("resaved.erd");

    let output = erd_diagram()
        .args([
            "inspect",
            diagram.to_str().unwrap(),
            "--catalog",
            &catalog,
            "-o",
            resaved.to_str().unwrap(),
        ])
        .output()
        .unwrap();
    assert!(output.status.success(), "Command failed: {:?}", output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Entities (1):"), "stdout: {}", stdout);
    assert!(stdout.contains("public.customers @ 10,10"));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invoices"), "stderr: {}", stderr);

    let xml = fs::read_to_string(&resaved).unwrap();
    assert!(xml.contains(r#"name="customers""#));
    assert!(!xml.contains("invoices"));
}

#[test]
fn test_build_from_ddl_json() {
    let temp_dir = TempDir::new().unwrap();
    let schema = temp_dir.path().join("schema.sql");
    fs::write(
        &schema,
        r#"
CREATE TABLE users (
  id INT NOT NULL,
  PRIMARY KEY (id)
);
CREATE TABLE posts (
  id INT NOT NULL,
  user_id INT NOT NULL,
  PRIMARY KEY (id),
  CONSTRAINT fk_posts_user FOREIGN KEY (user_id) REFERENCES users (id)
);
"#,
    )
    .unwrap();

    let output = erd_diagram()
        .args([
            "build",
            schema.to_str().unwrap(),
            "--data-source",
            "blog",
            "--schema",
            "main",
            "-a",
            "keys",
            "--json",
        ])
        .output()
        .unwrap();
    assert!(output.status.success(), "Command failed: {:?}", output);

    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let entities = summary["entities"].as_array().unwrap();
    assert_eq!(entities.len(), 2);
    assert_eq!(entities[0]["full_name"], "main.users");
    assert_eq!(summary["relations"][0]["name"], "fk_posts_user");
    assert_eq!(summary["pending"], 0);
}

#[test]
fn test_build_rejects_unknown_root() {
    let temp_dir = TempDir::new().unwrap();
    let catalog = write_catalog(temp_dir.path());

    let output = erd_diagram()
        .args(["build", &catalog, "-r", "crm:public"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unknown data source 'crm'"), "stderr: {}", stderr);
}

#[test]
fn test_missing_catalog_fails() {
    let output = erd_diagram()
        .args(["build", "/nonexistent/catalog.yaml"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("does not exist"), "stderr: {}", stderr);
}

#[test]
fn test_completions_bash() {
    let output = erd_diagram().args(["completions", "bash"]).output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("erd-diagram"));
    assert!(stdout.contains("inspect"));
}
