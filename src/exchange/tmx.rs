//! TMX Exchange
//!
//! TMX 1.4b XML 임포트·익스포트
//!
//! 익스포트는 필수 헤더(creationtool/srclang/creationdate)를 항상 기록하고,
//! 임포트는 선택 속성(prop/note) 누락을 허용합니다. 잘못된 XML은
//! ImportFormat 에러로 해당 임포트 호출만 중단합니다.

use std::io::{BufRead, Write};

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::TmError;
use crate::models::{NewSegment, SourceType, TmSegment, TranslationMemory};

/// TM 세그먼트들을 TMX 1.4b로 기록. 기록한 세그먼트 수를 반환합니다.
pub fn export<W: Write>(
    tm: &TranslationMemory,
    segments: &[TmSegment],
    writer: W,
) -> Result<u32, TmError> {
    let mut xml = Writer::new_with_indent(writer, b' ', 2);

    xml.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(write_error)?;

    let mut tmx = BytesStart::new("tmx");
    tmx.push_attribute(("version", "1.4"));
    xml.write_event(Event::Start(tmx)).map_err(write_error)?;

    let creation_date = chrono::Utc::now().format("%Y%m%dT%H%M%SZ").to_string();
    let mut header = BytesStart::new("header");
    header.push_attribute(("creationtool", "oddeyes-tm"));
    header.push_attribute(("creationtoolversion", env!("CARGO_PKG_VERSION")));
    header.push_attribute(("segtype", "sentence"));
    header.push_attribute(("o-tmf", "sqlite"));
    header.push_attribute(("adminlang", "en"));
    header.push_attribute(("srclang", tm.source_lang.as_str()));
    header.push_attribute(("datatype", "plaintext"));
    header.push_attribute(("creationdate", creation_date.as_str()));
    xml.write_event(Event::Empty(header)).map_err(write_error)?;

    xml.write_event(Event::Start(BytesStart::new("body")))
        .map_err(write_error)?;

    for segment in segments {
        xml.write_event(Event::Start(BytesStart::new("tu")))
            .map_err(write_error)?;

        write_prop(&mut xml, "quality", &segment.quality_score.to_string())?;
        write_prop(&mut xml, "source_type", segment.source_type.as_str())?;
        if let Some(notes) = &segment.notes {
            write_element(&mut xml, "note", notes)?;
        }

        write_tuv(&mut xml, &tm.source_lang, &segment.source_text)?;
        write_tuv(&mut xml, &tm.target_lang, &segment.target_text)?;

        xml.write_event(Event::End(BytesEnd::new("tu")))
            .map_err(write_error)?;
    }

    xml.write_event(Event::End(BytesEnd::new("body")))
        .map_err(write_error)?;
    xml.write_event(Event::End(BytesEnd::new("tmx")))
        .map_err(write_error)?;

    Ok(segments.len() as u32)
}

fn write_error<E: std::fmt::Display>(e: E) -> TmError {
    TmError::Io(std::io::Error::new(
        std::io::ErrorKind::Other,
        format!("XML write error: {}", e),
    ))
}

fn write_prop<W: Write>(xml: &mut Writer<W>, prop_type: &str, value: &str) -> Result<(), TmError> {
    let mut prop = BytesStart::new("prop");
    prop.push_attribute(("type", prop_type));
    xml.write_event(Event::Start(prop)).map_err(write_error)?;
    xml.write_event(Event::Text(BytesText::new(value)))
        .map_err(write_error)?;
    xml.write_event(Event::End(BytesEnd::new("prop")))
        .map_err(write_error)?;
    Ok(())
}

fn write_element<W: Write>(xml: &mut Writer<W>, name: &str, value: &str) -> Result<(), TmError> {
    xml.write_event(Event::Start(BytesStart::new(name)))
        .map_err(write_error)?;
    xml.write_event(Event::Text(BytesText::new(value)))
        .map_err(write_error)?;
    xml.write_event(Event::End(BytesEnd::new(name)))
        .map_err(write_error)?;
    Ok(())
}

fn write_tuv<W: Write>(xml: &mut Writer<W>, lang: &str, text: &str) -> Result<(), TmError> {
    let mut tuv = BytesStart::new("tuv");
    tuv.push_attribute(("xml:lang", lang));
    xml.write_event(Event::Start(tuv)).map_err(write_error)?;
    write_element(xml, "seg", text)?;
    xml.write_event(Event::End(BytesEnd::new("tuv")))
        .map_err(write_error)?;
    Ok(())
}

/// 현재 파싱 중인 텍스트의 목적지
enum TextTarget {
    None,
    Prop(String),
    Note,
    Seg,
}

/// TMX 1.4b를 NewSegment 리스트로 파싱
///
/// tuv의 xml:lang을 TM의 언어쌍과 대조해 source/target을 결정합니다.
/// 필수 tuv가 빠진 <tu>는 빈 텍스트로 통과시켜 벌크 경로에서
/// {index, error}로 보고되게 합니다.
pub fn parse<R: BufRead>(
    reader: R,
    source_lang: &str,
    target_lang: &str,
) -> Result<Vec<NewSegment>, TmError> {
    let mut xml = Reader::from_reader(reader);
    xml.config_mut().trim_text(true);

    let mut items = Vec::new();
    let mut buf = Vec::new();

    let mut target = TextTarget::None;
    let mut tuv_lang: Option<String> = None;
    let mut tu_source = String::new();
    let mut tu_target = String::new();
    let mut quality: Option<f64> = None;
    let mut source_type: Option<SourceType> = None;
    let mut notes: Option<String> = None;

    loop {
        match xml.read_event_into(&mut buf) {
            Err(e) => return Err(TmError::ImportFormat(format!("invalid TMX: {}", e))),
            Ok(Event::Eof) => break,
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"tu" => {
                    tu_source.clear();
                    tu_target.clear();
                    quality = None;
                    source_type = None;
                    notes = None;
                }
                b"prop" => {
                    let prop_type = read_attribute(&e, b"type")?.unwrap_or_default();
                    target = TextTarget::Prop(prop_type);
                }
                b"note" => target = TextTarget::Note,
                b"tuv" => tuv_lang = read_attribute(&e, b"xml:lang")?,
                b"seg" => target = TextTarget::Seg,
                _ => {}
            },
            Ok(Event::Text(t)) => {
                let text = t
                    .unescape()
                    .map_err(|e| TmError::ImportFormat(format!("invalid TMX text: {}", e)))?
                    .into_owned();
                match &target {
                    TextTarget::Prop(prop_type) => match prop_type.as_str() {
                        "quality" => quality = text.trim().parse::<f64>().ok(),
                        "source_type" => source_type = Some(SourceType::parse(&text)),
                        _ => {}
                    },
                    TextTarget::Note => notes.get_or_insert_with(String::new).push_str(&text),
                    TextTarget::Seg => {
                        // seg 텍스트는 여러 이벤트로 쪼개질 수 있으므로 누적
                        if let Some(lang) = &tuv_lang {
                            if lang_matches(lang, source_lang) {
                                tu_source.push_str(&text);
                            } else if lang_matches(lang, target_lang) {
                                tu_target.push_str(&text);
                            }
                        }
                    }
                    TextTarget::None => {}
                }
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"tu" => {
                    let mut item = NewSegment::new(&tu_source, &tu_target);
                    item.quality_score = quality.take();
                    item.source_type = source_type.take();
                    item.notes = notes.take();
                    items.push(item);
                }
                b"prop" | b"note" | b"seg" => target = TextTarget::None,
                b"tuv" => tuv_lang = None,
                _ => {}
            },
            Ok(_) => {}
        }
        buf.clear();
    }

    Ok(items)
}

fn read_attribute(e: &BytesStart, key: &[u8]) -> Result<Option<String>, TmError> {
    for attr in e.attributes() {
        let attr = attr.map_err(|e| TmError::ImportFormat(format!("invalid TMX attribute: {}", e)))?;
        if attr.key.as_ref() == key {
            let value = attr
                .unescape_value()
                .map_err(|e| TmError::ImportFormat(format!("invalid TMX attribute: {}", e)))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

/// 언어 코드 대조 ("en" == "EN", "en-US"도 "en"으로 허용)
fn lang_matches(candidate: &str, lang: &str) -> bool {
    let candidate = candidate.to_lowercase();
    let lang = lang.to_lowercase();
    candidate == lang || candidate.starts_with(&format!("{}-", lang))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewSegment;
    use std::io::Cursor;

    fn tm() -> TranslationMemory {
        TranslationMemory::new("Medical", "en", "vi", "medical")
    }

    #[test]
    fn export_writes_mandatory_header() {
        let tm = tm();
        let mut segment = TmSegment::new(&tm, &NewSegment::new("heart", "tim").with_quality(0.9));
        segment.notes = Some("anatomy".to_string());

        let mut out = Vec::new();
        let count = export(&tm, &[segment], &mut out).unwrap();
        let xml = String::from_utf8(out).unwrap();

        assert_eq!(count, 1);
        assert!(xml.contains("creationtool=\"oddeyes-tm\""));
        assert!(xml.contains("srclang=\"en\""));
        assert!(xml.contains("creationdate="));
        assert!(xml.contains("<prop type=\"quality\">0.9</prop>"));
        assert!(xml.contains("<prop type=\"source_type\">machine</prop>"));
        assert!(xml.contains("<note>anatomy</note>"));
        assert!(xml.contains("<seg>heart</seg>"));
        assert!(xml.contains("<seg>tim</seg>"));
    }

    #[test]
    fn parse_roundtrips_exported_tmx() {
        let tm = tm();
        let segments = vec![
            TmSegment::new(&tm, &NewSegment::new("heart", "tim").with_quality(0.9)),
            TmSegment::new(&tm, &NewSegment::new("lung", "phổi").with_quality(0.6)),
        ];

        let mut out = Vec::new();
        export(&tm, &segments, &mut out).unwrap();

        let items = parse(Cursor::new(out), "en", "vi").unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].source_text, "heart");
        assert_eq!(items[0].target_text, "tim");
        assert_eq!(items[0].quality_score, Some(0.9));
        assert_eq!(items[1].source_text, "lung");
    }

    #[test]
    fn parse_tolerates_missing_optional_props() {
        let tmx = r#"<?xml version="1.0" encoding="UTF-8"?>
<tmx version="1.4">
  <header creationtool="other" srclang="en" creationdate="20250101T000000Z"/>
  <body>
    <tu>
      <tuv xml:lang="en-US"><seg>kidney</seg></tuv>
      <tuv xml:lang="vi"><seg>thận</seg></tuv>
    </tu>
  </body>
</tmx>"#;

        let items = parse(Cursor::new(tmx.as_bytes()), "en", "vi").unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].source_text, "kidney");
        assert_eq!(items[0].target_text, "thận");
        assert!(items[0].quality_score.is_none());
        assert!(items[0].source_type.is_none());
    }

    #[test]
    fn parse_rejects_malformed_xml() {
        let broken = "<tmx><body><tu></oops></tu></body></tmx>";
        let err = parse(Cursor::new(broken.as_bytes()), "en", "vi").unwrap_err();
        assert!(matches!(err, TmError::ImportFormat(_)));
    }

    #[test]
    fn tu_without_target_tuv_becomes_reportable_row() {
        let tmx = r#"<tmx version="1.4"><body>
    <tu><tuv xml:lang="en"><seg>orphan</seg></tuv></tu>
</body></tmx>"#;

        let items = parse(Cursor::new(tmx.as_bytes()), "en", "vi").unwrap();
        assert_eq!(items.len(), 1);
        // 빈 target은 벌크 임포트에서 {index, error}로 보고됨
        assert!(items[0].target_text.is_empty());
    }
}
