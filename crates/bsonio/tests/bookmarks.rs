//! 书签回退场景
//!
//! 三种读取器读取同一份逻辑内容:在嵌套容器内部取书签,反复回退并重读,
//! 每一轮读到的事件序列必须完全相同,且三种读取器之间也相同。

use bsonio::{
    doc, to_bson_bytes, to_json, BinaryReaderSettings, Bson, BsonBinaryReader,
    BsonDocumentReader, BsonReader, BsonType, Document, JavaScriptWithScope, JsonOutputMode,
    JsonReader, JsonWriterSettings,
};

const REVISITS: usize = 4;

fn sample() -> Document {
    doc! {
        "first": 1,
        "outer": {
            "a": [1, [2, 3], { "b": "c" }],
            "code": (JavaScriptWithScope { code: "f(x)".into(), scope: doc! { "x": [null] } }),
            "z": 2.5,
        },
        "after": "tail",
    }
}

fn binary_reader() -> BsonBinaryReader {
    let bytes = to_bson_bytes(&sample()).unwrap();
    // 小块让书签位置落在不同的块中
    let settings = BinaryReaderSettings {
        chunk_size: 7,
        ..BinaryReaderSettings::default()
    };
    BsonBinaryReader::from_slice(&bytes, settings)
}

fn json_reader(mode: JsonOutputMode) -> JsonReader {
    let text = to_json(&Bson::Document(sample()), &JsonWriterSettings::new(mode)).unwrap();
    JsonReader::new(text)
}

fn document_reader() -> BsonDocumentReader {
    BsonDocumentReader::new(sample())
}

/// 读完当前文档剩余的元素,再退出并读取之后的元素
fn read_rest<R: BsonReader>(reader: &mut R) -> Vec<String> {
    let mut events = Vec::new();
    loop {
        let bson_type = reader.read_bson_type().unwrap();
        if bson_type == BsonType::EndOfDocument {
            break;
        }
        let name = reader.read_name().unwrap();
        let value = reader.read_value().unwrap();
        events.push(format!("{}={:?}", name, value));
    }
    reader.read_end_document().unwrap();
    assert!(reader.find_element("after").unwrap());
    events.push(format!("after={}", reader.read_string().unwrap()));
    events
}

/// 在 outer 文档内部取书签
fn revisit_inside_nested_document<R: BsonReader>(mut reader: R) -> Vec<String> {
    reader.read_start_document().unwrap();
    assert!(reader.find_element("outer").unwrap());
    reader.read_start_document().unwrap();
    let bookmark = reader.get_bookmark();

    let first = read_rest(&mut reader);
    for _ in 0..REVISITS {
        reader.return_to_bookmark(&bookmark);
        assert_eq!(read_rest(&mut reader), first);
    }
    first
}

/// 在两层数组内部、处于 Value 状态时取书签
fn revisit_inside_array<R: BsonReader>(mut reader: R) -> Vec<String> {
    reader.read_start_document().unwrap();
    assert!(reader.find_element("outer").unwrap());
    reader.read_start_document().unwrap();
    assert!(reader.find_element("a").unwrap());
    reader.read_start_array().unwrap();
    assert_eq!(reader.read_bson_type().unwrap(), BsonType::Int32);
    reader.skip_value().unwrap();
    assert_eq!(reader.read_bson_type().unwrap(), BsonType::Array);
    reader.read_start_array().unwrap();
    assert_eq!(reader.read_bson_type().unwrap(), BsonType::Int32);
    let bookmark = reader.get_bookmark();

    let mut rounds = Vec::new();
    for _ in 0..REVISITS {
        reader.return_to_bookmark(&bookmark);
        let mut events = vec![
            reader.current_name().unwrap_or_default().to_string(),
            reader.read_int32().unwrap().to_string(),
        ];
        assert_eq!(reader.read_bson_type().unwrap(), BsonType::Int32);
        events.push(reader.read_int32().unwrap().to_string());
        assert_eq!(reader.read_bson_type().unwrap(), BsonType::EndOfDocument);
        reader.read_end_array().unwrap();
        assert_eq!(reader.read_bson_type().unwrap(), BsonType::Document);
        reader.read_start_document().unwrap();
        events.push(format!("{:?}", reader.find_string_element("b").unwrap()));
        rounds.push(events);
    }
    assert!(rounds.windows(2).all(|w| w[0] == w[1]));
    rounds.remove(0)
}

/// 在作用域文档内部取书签
fn revisit_inside_scope<R: BsonReader>(mut reader: R) -> Vec<String> {
    reader.read_start_document().unwrap();
    assert!(reader.find_element("outer").unwrap());
    reader.read_start_document().unwrap();
    assert!(reader.find_element("code").unwrap());
    assert_eq!(reader.read_javascript_with_scope().unwrap(), "f(x)");
    reader.read_start_document().unwrap();
    let bookmark = reader.get_bookmark();

    let mut rounds = Vec::new();
    for _ in 0..REVISITS {
        reader.return_to_bookmark(&bookmark);
        assert!(reader.find_element("x").unwrap());
        let value = reader.read_value().unwrap();
        assert_eq!(reader.read_bson_type().unwrap(), BsonType::EndOfDocument);
        reader.read_end_document().unwrap();
        assert!(reader.find_element("z").unwrap());
        rounds.push(vec![format!("{:?}", value), reader.read_double().unwrap().to_string()]);
    }
    assert!(rounds.windows(2).all(|w| w[0] == w[1]));
    rounds.remove(0)
}

#[test]
fn test_nested_document_bookmark_all_readers() {
    let expected = revisit_inside_nested_document(document_reader());
    assert_eq!(expected.len(), 4);
    assert_eq!(revisit_inside_nested_document(binary_reader()), expected);
    for mode in [JsonOutputMode::Strict, JsonOutputMode::Shell, JsonOutputMode::TenGen] {
        assert_eq!(revisit_inside_nested_document(json_reader(mode)), expected, "{:?}", mode);
    }
}

#[test]
fn test_array_bookmark_all_readers() {
    let expected = revisit_inside_array(document_reader());
    assert_eq!(expected, vec!["0", "2", "3", "Some(\"c\")"]);
    assert_eq!(revisit_inside_array(binary_reader()), expected);
    for mode in [JsonOutputMode::Strict, JsonOutputMode::Shell, JsonOutputMode::TenGen] {
        assert_eq!(revisit_inside_array(json_reader(mode)), expected, "{:?}", mode);
    }
}

#[test]
fn test_scope_bookmark_all_readers() {
    let expected = revisit_inside_scope(document_reader());
    assert_eq!(expected[1], "2.5");
    assert_eq!(revisit_inside_scope(binary_reader()), expected);
    assert_eq!(revisit_inside_scope(json_reader(JsonOutputMode::Strict)), expected);
}

#[test]
fn test_bookmark_at_top_level_between_documents() {
    let mut bytes = to_bson_bytes(&doc! { "n": 1 }).unwrap();
    bytes.extend(to_bson_bytes(&doc! { "n": 2 }).unwrap());
    let mut reader = BsonBinaryReader::from_slice(&bytes, BinaryReaderSettings::default());
    assert_eq!(reader.read_document().unwrap().get_i32("n"), Some(1));
    let bookmark = reader.get_bookmark();
    for _ in 0..REVISITS {
        reader.return_to_bookmark(&bookmark);
        assert_eq!(reader.read_document().unwrap().get_i32("n"), Some(2));
        assert!(reader.is_at_end_of_file().unwrap());
    }
}
