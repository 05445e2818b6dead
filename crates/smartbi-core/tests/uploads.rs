//! Loading `.csv` and `.sql` uploads into the in-memory database and
//! analyzing them like a live connection.

use serde_json::json;
use smartbi_core::analysis;
use smartbi_core::config::SmartBiConfig;
use smartbi_core::connector::Connector;
use smartbi_core::upload::{load_upload, SpooledUpload, UploadKind};
use smartbi_core::{Extraction, SmartBiError};
use smartbi_testutil::ScriptedModel;

const CSV: &str = "order_id,customer,amount,notes\n\
1,Alice,19.99,first order\n\
2,Bob,5,\"gift, wrapped\"\n\
3,Carol,120.5,\n";

const DUMP: &str = r#"-- MySQL dump 10.13  Distrib 8.0.36
/*!40101 SET @OLD_CHARACTER_SET_CLIENT=@@CHARACTER_SET_CLIENT */;
SET NAMES utf8mb4;

DROP TABLE IF EXISTS `customers`;
CREATE TABLE `customers` (
  `id` int unsigned NOT NULL AUTO_INCREMENT,
  `name` varchar(100) COLLATE utf8mb4_unicode_ci NOT NULL,
  `city` varchar(60) DEFAULT NULL,
  PRIMARY KEY (`id`),
  KEY `idx_city` (`city`)
) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;

CREATE TABLE `invoices` (
  `id` bigint NOT NULL,
  `customer_id` int NOT NULL,
  `total` decimal(12,2) NOT NULL,
  `issued_on` date NOT NULL,
  PRIMARY KEY (`id`),
  CONSTRAINT `fk_customer` FOREIGN KEY (`customer_id`) REFERENCES `customers` (`id`)
) ENGINE=InnoDB;

LOCK TABLES `customers` WRITE;
INSERT INTO `customers` VALUES (1,'Ana','Lisboa'),(2,'D\'Angelo','Porto'),(3,'Zé',NULL);
UNLOCK TABLES;

INSERT INTO `invoices` VALUES (10,1,99.90,'2024-05-01'),(11,2,15.00,'2024-05-02');
INSERT INTO `missing_table` VALUES (1);
"#;

fn spool(name: &str, body: &str) -> SpooledUpload {
    let mut upload = SpooledUpload::new(Some(name), 1024 * 1024).unwrap();
    for chunk in body.as_bytes().chunks(7) {
        upload.write_chunk(chunk).unwrap();
    }
    upload
}

#[tokio::test]
async fn test_csv_upload_loads_one_table() {
    let upload = spool("Monthly Orders.csv", CSV);
    assert_eq!(upload.kind(), UploadKind::Csv);

    let (connector, report) = load_upload(&upload).await.unwrap();
    assert_eq!(report.tables_created, vec!["monthly_orders"]);
    assert_eq!(report.rows_loaded, 3);

    let columns = connector.describe_table("monthly_orders").await.unwrap();
    let types: Vec<(&str, &str)> = columns
        .iter()
        .map(|c| (c.name.as_str(), c.declared_type.as_str()))
        .collect();
    assert_eq!(
        types,
        vec![
            ("order_id", "INTEGER"),
            ("customer", "TEXT"),
            ("amount", "REAL"),
            ("notes", "TEXT")
        ]
    );

    let rows = connector.sample_rows("monthly_orders", 1000).await.unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[1]["notes"], json!("gift, wrapped"));
    assert_eq!(rows[1]["amount"], json!(5.0));
    assert_eq!(rows[2]["notes"], serde_json::Value::Null);

    connector.close().await;
}

#[tokio::test]
async fn test_csv_upload_lists_only_its_table() {
    let upload = spool("sales.csv", CSV);
    let (connector, _) = load_upload(&upload).await.unwrap();

    let tables = connector.list_tables().await.unwrap();
    assert_eq!(tables, vec!["sales"]);

    connector.close().await;
}

#[tokio::test]
async fn test_csv_blank_header_next_to_generated_name() {
    let upload = spool("export.csv", "column_2,\na,1\nb,2\n");
    let (connector, report) = load_upload(&upload).await.unwrap();
    assert_eq!(report.rows_loaded, 2);

    let columns = connector.describe_table("export").await.unwrap();
    let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["column_2", "column_2_2"]);

    connector.close().await;
}

#[tokio::test]
async fn test_csv_quoted_line_breaks_and_crlf() {
    let text = "id,note\r\n1,\"two\r\nlines\"\r\n\r\n2,plain\r\n";
    let upload = spool("notes.csv", text);
    let (connector, report) = load_upload(&upload).await.unwrap();
    assert_eq!(report.rows_loaded, 2);

    let rows = connector.sample_rows("notes", 10).await.unwrap();
    assert_eq!(rows[0]["note"], json!("two\r\nlines"));
    assert_eq!(rows[1]["id"], json!(2));

    connector.close().await;
}

#[tokio::test]
async fn test_sql_dump_upload_loads_tables_and_rows() {
    let upload = spool("shop_backup.sql", DUMP);
    let (connector, report) = load_upload(&upload).await.unwrap();

    assert_eq!(report.tables_created, vec!["customers", "invoices"]);
    assert_eq!(report.rows_loaded, 5);
    assert_eq!(report.statements_failed, 1);
    assert_eq!(report.statements_skipped, 1);

    let customers = connector.sample_rows("customers", 10).await.unwrap();
    assert_eq!(customers.len(), 3);
    assert_eq!(customers[1]["name"], json!("D'Angelo"));
    assert_eq!(customers[2]["name"], json!("Zé"));
    assert_eq!(connector.count_rows("invoices").await.unwrap(), 2);

    connector.close().await;
}

#[tokio::test]
async fn test_dump_without_tables_is_rejected() {
    let upload = spool("noise.sql", "SET NAMES utf8mb4;\nINSERT INTO t VALUES (1);\n");
    let err = load_upload(&upload).await.err().unwrap();
    assert!(matches!(err, SmartBiError::Upload { .. }));
}

#[tokio::test]
async fn test_empty_upload_is_rejected() {
    let upload = spool("empty.csv", "  \n");
    let err = load_upload(&upload).await.err().unwrap();
    assert!(matches!(err, SmartBiError::Upload { .. }));
}

#[tokio::test]
async fn test_analyze_csv_upload_end_to_end() {
    let upload = spool("orders.csv", CSV);
    let model = ScriptedModel::replying("Bob's orders are small but frequent.");

    let analysis = analysis::analyze_upload(&upload, &SmartBiConfig::default(), &model)
        .await
        .unwrap();

    assert_eq!(analysis.file_info.filename, "orders.csv");
    assert_eq!(analysis.file_info.size, CSV.len() as u64);
    assert_eq!(analysis.file_info.kind, UploadKind::Csv);
    assert_eq!(analysis.data_summary.tables_processed, 1);
    assert_eq!(analysis.data_summary.total_records, 3);
    assert_eq!(analysis.model_narrative, "Bob's orders are small but frequent.");
    assert!(model.prompts()[0].contains("## Table: orders"));
}

#[tokio::test]
async fn test_prepare_upload_uses_shared_extraction() {
    let upload = spool("shop.sql", DUMP);
    let (report, extraction, summary) =
        analysis::prepare_upload(&upload, &SmartBiConfig::default())
            .await
            .unwrap();

    assert_eq!(report.tables_created.len(), 2);
    let Extraction::Full { schema, samples } = &extraction else {
        panic!("expected a full extraction");
    };
    assert_eq!(schema.total_tables, 2);
    assert_eq!(samples.total_records, 5);
    assert!(summary.text.contains("## Table: customers"));
    assert!(summary.text.contains("## Table: invoices"));
}
