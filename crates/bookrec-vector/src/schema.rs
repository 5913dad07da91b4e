use arrow_schema::{DataType, Field, Schema, TimeUnit};
use std::sync::Arc;

/// Snapshot table of one built corpus. `authors` holds a JSON array;
/// `position` is the corpus order.
pub fn build_books_schema(dim: i32) -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new("position", DataType::Int64, false),
		Field::new("id", DataType::Utf8, false),
		Field::new("title", DataType::Utf8, false),
		Field::new("authors", DataType::Utf8, false),
		Field::new("description", DataType::Utf8, false),
		Field::new("processed_text", DataType::Utf8, false),
		Field::new("vector", DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim), true),
	]))
}

pub fn build_meta_schema() -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new("key", DataType::Utf8, false),
		Field::new("value", DataType::Utf8, false),
		Field::new("updated_at", DataType::Timestamp(TimeUnit::Millisecond, None), false),
	]))
}
