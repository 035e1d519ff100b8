use super::LocalStore;
use crate::error::StoreError;

const READ_MARKER_PREFIX: &str = "inbox.last_read.";

fn marker_key(phone: &str) -> String {
    format!("{}{}", READ_MARKER_PREFIX, phone)
}

/// Last-read epoch millis for a phone, if the operator ever opened it
pub fn get_last_read(store: &LocalStore, phone: &str) -> Result<Option<i64>, StoreError> {
    store.get::<i64>(&marker_key(phone))
}

pub fn set_last_read(store: &LocalStore, phone: &str, millis: i64) -> Result<(), StoreError> {
    store.set(&marker_key(phone), &millis)
}
