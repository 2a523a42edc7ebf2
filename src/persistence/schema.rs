use rusqlite::Connection;

pub fn migrate(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS fraud_detection (
            id                       INTEGER PRIMARY KEY AUTOINCREMENT,
            record_id                TEXT NOT NULL UNIQUE,
            transaction_id           TEXT NOT NULL,
            transaction_date         TEXT,
            transaction_amount       TEXT,
            transaction_channel      TEXT,
            transaction_payment_mode TEXT,
            payment_gateway_bank     TEXT,
            payer_email              TEXT,
            payer_mobile             TEXT,
            payer_card_brand         TEXT,
            payer_device             TEXT,
            payer_browser            TEXT,
            payee_id                 TEXT,
            is_fraud_predicted       INTEGER NOT NULL,
            fraud_source             TEXT NOT NULL,
            fraud_reason             TEXT NOT NULL,
            fraud_score              REAL NOT NULL,
            user_id                  TEXT NOT NULL,
            created_at               TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_fraud_detection_tx ON fraud_detection(transaction_id);
        CREATE INDEX IF NOT EXISTS idx_fraud_detection_user ON fraud_detection(user_id, created_at DESC);
        ",
    )?;
    Ok(())
}
