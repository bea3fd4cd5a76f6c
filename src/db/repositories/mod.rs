pub(super) mod kv;
