//! Exchange Module
//!
//! TM 상호 교환 포맷 (TMX 1.4b / CSV) 임포트·익스포트

pub mod csv;
pub mod tmx;
