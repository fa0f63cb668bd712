//! Turns one framed response line (as produced by [`crate::framer::Framer`]) into an owned
//! [`Response`]. Nothing returned here borrows from the line it was parsed from: the grammar
//! copies every byte it keeps, so the framer's buffer can be compacted the moment parsing
//! finishes.
//!
//! https://www.rfc-editor.org/rfc/rfc2234#section-2.3
//! https://www.rfc-editor.org/rfc/rfc3501#section-9

use crate::error::{Error, Result};
use crate::types::{
  Address, AppendUid, Basic, BodyStructure, CopyUid, Disposition, EmbeddedMessage, Envelope,
  Multipart, Part, Range, Section, StatusAttrs,
};
use std::collections::BTreeMap;

/// A digit string is only guaranteed to be `1*DIGIT` by the grammar, not that it fits in `T` — a
/// server sending e.g. `99999999999999999999` for an `EXISTS` count is grammatically valid and
/// must fail the rule instead of panicking.
fn parse_number<T: std::str::FromStr>(n: &[u8]) -> std::result::Result<T, &'static str> {
  std::str::from_utf8(n)
    .map_err(|_| "number is not valid utf-8")?
    .parse()
    .map_err(|_| "number out of range")
}

fn lossy(bytes: &[u8]) -> String {
  String::from_utf8_lossy(bytes).into_owned()
}

trait ParserHacks {
  fn skip(&self, position: usize, n: usize) -> peg::RuleResult<()>;
}

impl ParserHacks for [u8] {
  fn skip(&self, position: usize, n: usize) -> peg::RuleResult<()> {
    if self.len() >= position + n {
      return peg::RuleResult::Matched(position + n, ());
    }
    peg::RuleResult::Failed
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
  Ok,
  No,
  Bad,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResponseCode {
  Capability(Vec<String>),
  Alert,
  Parse,
  TryCreate,
  UidValidity(u32),
  UidNext(u32),
  Unseen(u32),
  PermanentFlags(Vec<String>),
  ReadOnly,
  ReadWrite,
  HighestModSeq(u64),
  Modified(Vec<Range>),
  AppendUid(AppendUid),
  CopyUid(CopyUid),
  BadCharset(Vec<String>),
  Other(String, Option<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MailboxListing {
  pub attribs: Vec<String>,
  pub delimiter: Option<char>,
  pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchAttr {
  Flags(Vec<String>),
  Uid(u32),
  InternalDate(String),
  Rfc822Size(u32),
  Envelope(Envelope),
  BodyStructure(BodyStructure),
  Body(Part),
  ModSeq(u64),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Untagged {
  Capability(Vec<String>),
  Enabled(Vec<String>),
  List(MailboxListing),
  Lsub(MailboxListing),
  Status { mailbox: String, attrs: StatusAttrs },
  Search { ids: Vec<u32>, modseq: Option<u64> },
  Flags(Vec<String>),
  Exists(u32),
  Recent(u32),
  Expunge(u32),
  Fetch { seqno: u32, attrs: Vec<FetchAttr> },
  Vanished { earlier: bool, uids: Vec<Range> },
  Bye { code: Option<ResponseCode>, text: String },
  Ok { code: Option<ResponseCode>, text: String },
  No { code: Option<ResponseCode>, text: String },
  Bad { code: Option<ResponseCode>, text: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Response {
  Tagged {
    tag: String,
    status: Status,
    code: Option<ResponseCode>,
    text: String,
  },
  Untagged(Untagged),
  Continuation(String),
}

peg::parser! {
  pub grammar grammar() for [u8] {
    rule CR() = "\r"
    rule LF() = "\n"
    rule CRLF() = CR() LF()
    rule CHAR() -> u8 = [b'\x01'..=b'\x7f']
    rule CHAR8() = [b'\x01'..=b'\xff']
    rule CTL() = [b'\x00'..=b'\x1f'] / "\x7f"
    rule DQUOTE() = "\""
    rule SP() = " "
    rule TEXT_CHAR() -> u8 = !(CR() / LF()) c:CHAR() { c }
    rule DIGIT() = [b'\x30'..=b'\x39']
    rule digit_nz() = [b'\x31'..=b'\x39']

    rule number() -> u32 = n:$(DIGIT()+) {? parse_number(n) }
    rule number64() -> u64 = n:$(DIGIT()+) {? parse_number(n) }
    rule nz_number() -> u32 = n:$(digit_nz() DIGIT()*) {? parse_number(n) }
    rule uniqueid() -> u32 = nz_number()
    rule text() -> String = t:$(TEXT_CHAR()+) { lossy(t) }
    rule maybe_text() -> String = t:$(TEXT_CHAR()*) { lossy(t) }

    rule nil() = "NIL" / "nil" / "Nil"
    rule list_wildcards() = "%" / "*"
    rule quoted_specials() -> u8 = c:(DQUOTE() { b'"' } / ("\\" { b'\\' })) { c }
    rule QUOTED_CHAR() -> u8
      = !quoted_specials() c:TEXT_CHAR() { c } / "\\" c:quoted_specials() { c }
    rule resp_specials() = "]"
    rule atom_specials() = "(" / ")" / "{" / SP() / CTL() / list_wildcards() / quoted_specials() / resp_specials()
    rule ATOM_CHAR() = !atom_specials() CHAR()
    rule atom() -> String = a:$(ATOM_CHAR()+) { lossy(a) }
    rule ASTRING_CHAR() = ATOM_CHAR() / resp_specials()
    rule quoted() -> Vec<u8> = DQUOTE() q:(QUOTED_CHAR()*) DQUOTE() { q }
    rule literal() -> Vec<u8>
      = "{" n:number() "+"? "}" CRLF() position!() l:$(##skip(n as usize))
      { l.to_vec() }
    rule string() -> Vec<u8> = quoted() / literal()
    rule astring() -> Vec<u8> = s:$(ASTRING_CHAR()+) { s.to_vec() } / string()
    rule nstring() -> Option<Vec<u8>> = s:string() { Some(s) } / nil() { None }
    rule nstring_str() -> Option<String> = s:nstring() { s.map(|s| lossy(&s)) }
    rule astring_str() -> String = s:astring() { lossy(&s) }

    rule tag() -> String = t:$((!"+" ASTRING_CHAR())+) { lossy(t) }

    rule auth_type() -> String = atom()
    rule capability() -> String = c:$(("AUTH=" auth_type()) / atom()) { lossy(c) }
    rule capability_data() -> Vec<String>
      = "CAPABILITY" cs:(SP() c:capability() { c })+ { cs }

    rule mailbox() -> String
      = ("i" / "I") ("n" / "N") ("b" / "B") ("o" / "O") ("x" / "X") { "INBOX".to_string() }
      / m:astring() { lossy(&m) }

    rule mbx_list_flags() -> Vec<String>
      = fs:((f:$("\\" atom()) { lossy(f) }) ** SP()) { fs }
    rule mailbox_list() -> MailboxListing
      = "(" fs:mbx_list_flags() ")" SP()
        c:(DQUOTE() c:QUOTED_CHAR() DQUOTE() { Some(c as char) } / nil() { None })
        SP() m:mailbox()
      { MailboxListing { attribs: fs, delimiter: c, name: m } }

    rule flag_keyword() -> String = atom()
    rule flag_extension() -> String = f:$("\\" atom()) { lossy(f) }
    rule flag() -> String = flag_keyword() / flag_extension()
    rule flag_perm() -> String = flag() / $("\\*") { "\\*".to_string() }
    rule flag_fetch() -> String = flag()

    rule mod_sequence_value() -> u64 = n:$(DIGIT()+) {? parse_number(n) }
    rule permsg_modsequence() -> u64 = mod_sequence_value()

    rule seq_number() -> Range = n:nz_number() { Range(n, n) } / "*" { Range(0, u32::MAX) }
    rule seq_range() -> Range
      = r1:seq_number() ":" r2:seq_number()
      { if r1.0 <= r2.1 { Range(r1.0, r2.1) } else { Range(r2.0, r1.0) } }
    rule sequence_set() -> Vec<Range> = (seq_range() / seq_number()) ** ","
    rule known_uids() -> Vec<Range> = sequence_set()
    rule uid_range() -> Range
      = u1:uniqueid() ":" u2:uniqueid()
      { if u1 <= u2 { Range(u1, u2) } else { Range(u2, u1) } }
    rule uid_set() -> Vec<Range> = (u:uniqueid() { Range(u, u) } / uid_range()) ** ","

    // Quoted or atom date-time, e.g. "17-Jul-1996 02:44:25 -0700".
    rule date_time() -> String = s:string() { lossy(&s) }

    rule addr_part() -> Option<String> = nstring_str()
    rule address() -> Address
      = "(" name:addr_part() SP() _adl:addr_part() SP() mailbox:addr_part() SP() host:addr_part() ")"
      { Address { name, mailbox, host } }
    rule address_list() -> Vec<Address>
      = "(" a:(address() ** SP()) ")" { a }
      / nil() { Vec::new() }

    rule env_date() -> Option<String> = nstring_str()
    rule env_subject() -> Option<String> = nstring_str()
    rule env_in_reply_to() -> Option<String> = nstring_str()
    rule env_message_id() -> Option<String> = nstring_str()

    pub rule envelope() -> Envelope
      = "(" date:env_date() SP()
            subject:env_subject() SP()
            from:address_list() SP()
            sender:address_list() SP()
            reply_to:address_list() SP()
            to:address_list() SP()
            cc:address_list() SP()
            bcc:address_list() SP()
            in_reply_to:env_in_reply_to() SP()
            message_id:env_message_id()
        ")"
      {
        Envelope { date, subject, from, sender, reply_to, to, cc, bcc, in_reply_to, message_id }
      }

    rule body_fld_param() -> BTreeMap<String, String>
      = "(" entries:((k:string() SP() v:string() { (lossy(&k), lossy(&v)) }) ** SP()) ")"
      { entries.into_iter().collect() }
      / nil() { BTreeMap::new() }
    rule body_fld_id() -> Option<String> = nstring_str()
    rule body_fld_desc() -> Option<String> = nstring_str()
    rule body_fld_enc() -> String = s:string() { lossy(&s) }
    rule body_fld_octets() -> u32 = number()
    rule body_fld_lines() -> u32 = number()
    rule body_fld_md5() -> Option<String> = nstring_str()
    rule body_fld_loc() -> Option<String> = nstring_str()
    rule body_fld_lang() -> Vec<String>
      = s:nstring_str() { s.into_iter().collect() }
      / "(" langs:(s:string() { lossy(&s) } ** SP()) ")" { langs }
    rule body_fld_dsp() -> Option<Disposition>
      = "(" kind:string() SP() params:body_fld_param() ")"
      { Some(Disposition { kind: lossy(&kind), params }) }
      / nil() { None }

    rule body_ext_1part() -> (Option<String>, Option<Disposition>, Vec<String>, Option<String>)
      = md5:body_fld_md5()
        dsp:(SP() d:body_fld_dsp() { d })?
        lang:(SP() l:body_fld_lang() { l })?
        loc:(SP() l:body_fld_loc() { l })?
      { (md5, dsp.flatten(), lang.unwrap_or_default(), loc.flatten()) }

    rule body_ext_mpart() -> (BTreeMap<String, String>, Option<Disposition>, Vec<String>, Option<String>)
      = params:(SP() p:body_fld_param() { p })?
        dsp:(SP() d:body_fld_dsp() { d })?
        lang:(SP() l:body_fld_lang() { l })?
        loc:(SP() l:body_fld_loc() { l })?
      { (params.unwrap_or_default(), dsp.flatten(), lang.unwrap_or_default(), loc.flatten()) }

    rule media_basic() -> (String, String)
      = t:string() SP() s:string() { (lossy(&t), lossy(&s)) }

    rule body_type_text() -> Basic
      = t:string() SP() "\"TEXT\"" param:body_fld_param() SP()
        id:body_fld_id() SP() desc:body_fld_desc() SP() enc:body_fld_enc() SP()
        octets:body_fld_octets() SP() lines:body_fld_lines()
        ext:(SP() e:body_ext_1part() { e })?
      {
        let (md5, disposition, language, location) = ext.unwrap_or_default();
        Basic {
          media_type: lossy(&t), media_subtype: "TEXT".to_string(), params: param, id, description: desc,
          encoding: enc, size: octets, lines: Some(lines), md5, disposition, language, location,
          embedded_message: None,
        }
      }

    rule body_type_msg() -> Basic
      = t:string() SP() "\"MESSAGE\"" SP() "\"RFC822\"" param:body_fld_param() SP()
        id:body_fld_id() SP() desc:body_fld_desc() SP() enc:body_fld_enc() SP()
        octets:body_fld_octets() SP()
        envelope:envelope() SP()
        body:body() SP()
        lines:body_fld_lines()
        ext:(SP() e:body_ext_1part() { e })?
      {
        let (md5, disposition, language, location) = ext.unwrap_or_default();
        Basic {
          media_type: lossy(&t), media_subtype: "RFC822".to_string(), params: param, id, description: desc,
          encoding: enc, size: octets, lines: Some(lines), md5, disposition, language, location,
          embedded_message: Some(Box::new(EmbeddedMessage { envelope, body, lines })),
        }
      }

    rule body_type_basic() -> Basic
      = t:media_basic() param:body_fld_param() SP()
        id:body_fld_id() SP() desc:body_fld_desc() SP() enc:body_fld_enc() SP()
        octets:body_fld_octets()
        ext:(SP() e:body_ext_1part() { e })?
      {
        let (md5, disposition, language, location) = ext.unwrap_or_default();
        Basic {
          media_type: t.0, media_subtype: t.1, params: param, id, description: desc,
          encoding: enc, size: octets, lines: None, md5, disposition, language, location,
          embedded_message: None,
        }
      }

    rule body_type_1part() -> BodyStructure
      = b:(body_type_msg() / body_type_text() / body_type_basic()) { BodyStructure::Basic(b) }

    rule body_type_mpart() -> BodyStructure
      = parts:body()+ SP() subtype:string()
        ext:(SP() e:body_ext_mpart() { e })?
      {
        let (params, disposition, language, location) = ext.unwrap_or_default();
        BodyStructure::Multipart(Multipart {
          media_subtype: lossy(&subtype), parts, params, disposition, language, location,
        })
      }

    pub rule body() -> BodyStructure
      = "(" b:(body_type_1part() / body_type_mpart()) ")" { b }

    rule section_spec() -> String = s:$((!"]" [_])*) { lossy(s) }
    pub rule section() -> Section
      = "[" spec:section_spec() "]" offset:("<" n:number() ">" { n })?
      { Section { spec, partial_offset: offset } }

    rule msg_att_flags() -> Vec<String> = "FLAGS" SP() "(" fs:(flag_fetch() ** SP()) ")" { fs }
    rule msg_att_uid() -> u32 = "UID" SP() u:uniqueid() { u }
    rule msg_att_internaldate() -> String = "INTERNALDATE" SP() d:date_time() { d }
    rule msg_att_rfc822size() -> u32 = "RFC822.SIZE" SP() n:number() { n }
    rule msg_att_envelope() -> Envelope = "ENVELOPE" SP() e:envelope() { e }
    rule msg_att_bodystructure() -> BodyStructure
      = ("BODYSTRUCTURE" / "BODY") SP() b:body() { b }
    rule msg_att_body_section() -> Part
      = "BODY" s:section() offset:("<" n:number() ">" { n })? SP() data:nstring()
      {
        Part {
          section: Section { spec: s.spec, partial_offset: s.partial_offset.or(offset) },
          size: data.as_ref().map(|d| d.len() as u32).unwrap_or(0),
          data: data.unwrap_or_default(),
        }
      }
    rule msg_att_modseq() -> u64 = "MODSEQ" SP() "(" m:permsg_modsequence() ")" { m }

    rule msg_att_item() -> FetchAttr
      = f:msg_att_flags() { FetchAttr::Flags(f) }
      / u:msg_att_uid() { FetchAttr::Uid(u) }
      / d:msg_att_internaldate() { FetchAttr::InternalDate(d) }
      / n:msg_att_rfc822size() { FetchAttr::Rfc822Size(n) }
      / e:msg_att_envelope() { FetchAttr::Envelope(e) }
      / b:msg_att_bodystructure() { FetchAttr::BodyStructure(b) }
      / p:msg_att_body_section() { FetchAttr::Body(p) }
      / m:msg_att_modseq() { FetchAttr::ModSeq(m) }

    rule msg_att() -> Vec<FetchAttr> = "(" items:(msg_att_item() ** SP()) ")" { items }

    rule resp_code_permanentflags() -> Vec<String>
      = "PERMANENTFLAGS" SP() "(" fs:(flag_perm() ** SP()) ")" { fs }
    rule resp_code_uidvalidity() -> u32 = "UIDVALIDITY" SP() n:nz_number() { n }
    rule resp_code_uidnext() -> u32 = "UIDNEXT" SP() n:nz_number() { n }
    rule resp_code_unseen() -> u32 = "UNSEEN" SP() n:nz_number() { n }
    rule resp_code_highestmodseq() -> u64 = "HIGHESTMODSEQ" SP() n:mod_sequence_value() { n }
    rule resp_code_apnd() -> AppendUid
      = "APPENDUID" SP() n:nz_number() SP() u:uniqueid()
      { AppendUid { uidvalidity: n, uid: u } }
    rule resp_code_modified() -> Vec<Range> = "MODIFIED" SP() s:sequence_set() { s }
    rule resp_code_copy() -> CopyUid
      = "COPYUID" SP() n:nz_number() SP() us1:uid_set() SP() us2:uid_set()
      { CopyUid { uidvalidity: n, from: us1, to: us2 } }
    rule resp_code_badcharset() -> Vec<String>
      = "BADCHARSET" cs:(SP() c:astring_str() { c })* { cs }
    rule resp_code_other() -> (String, Option<String>)
      = a:atom() t:(SP() t:text() { t })?
      { (a, t) }

    pub rule response_code() -> ResponseCode
      = c:capability_data() { ResponseCode::Capability(c) }
      / "ALERT" { ResponseCode::Alert }
      / "PARSE" { ResponseCode::Parse }
      / "TRYCREATE" { ResponseCode::TryCreate }
      / "READ-ONLY" { ResponseCode::ReadOnly }
      / "READ-WRITE" { ResponseCode::ReadWrite }
      / f:resp_code_permanentflags() { ResponseCode::PermanentFlags(f) }
      / n:resp_code_uidvalidity() { ResponseCode::UidValidity(n) }
      / n:resp_code_uidnext() { ResponseCode::UidNext(n) }
      / n:resp_code_unseen() { ResponseCode::Unseen(n) }
      / n:resp_code_highestmodseq() { ResponseCode::HighestModSeq(n) }
      / a:resp_code_apnd() { ResponseCode::AppendUid(a) }
      / s:resp_code_modified() { ResponseCode::Modified(s) }
      / c:resp_code_copy() { ResponseCode::CopyUid(c) }
      / b:resp_code_badcharset() { ResponseCode::BadCharset(b) }
      / o:resp_code_other() { ResponseCode::Other(o.0, o.1) }

    rule resp_text() -> (Option<ResponseCode>, String)
      = code:("[" c:response_code() "]" SP()? { c })? t:maybe_text()
      { (code, t) }

    rule resp_cond_state(kind: &'static str) -> (Option<ResponseCode>, String)
      = k:$(['O'|'o']['K'|'k'] / ['N'|'n']['O'|'o'] / ['B'|'b']['A'|'a']['D'|'d']) SP() t:resp_text()
      {?
        let observed = lossy(k).to_ascii_uppercase();
        if observed == kind { Ok(t) } else { Err("status mismatch") }
      }

    rule status_ok() -> (Option<ResponseCode>, String) = resp_cond_state("OK")
    rule status_no() -> (Option<ResponseCode>, String) = resp_cond_state("NO")
    rule status_bad() -> (Option<ResponseCode>, String) = resp_cond_state("BAD")

    rule mailbox_data_flags() -> Vec<String> = "FLAGS" SP() "(" fs:(flag() ** SP()) ")" { fs }
    rule mailbox_data_list() -> MailboxListing = "LIST" SP() l:mailbox_list() { l }
    rule mailbox_data_lsub() -> MailboxListing = "LSUB" SP() l:mailbox_list() { l }
    rule status_att() -> (String, u64)
      = n:$("MESSAGES" / "RECENT" / "UIDNEXT" / "UIDVALIDITY" / "UNSEEN" / "HIGHESTMODSEQ") SP() v:number64()
      { (lossy(n), v) }
    rule mailbox_data_status() -> (String, StatusAttrs)
      = "STATUS" SP() m:mailbox() SP() "(" atts:(status_att() ** SP()) ")"
      {
        let mut attrs = StatusAttrs::default();
        for (name, value) in atts {
          match name.as_str() {
            "MESSAGES" => attrs.messages = Some(value as u32),
            "RECENT" => attrs.recent = Some(value as u32),
            "UIDNEXT" => attrs.uidnext = Some(value as u32),
            "UIDVALIDITY" => attrs.uidvalidity = Some(value as u32),
            "UNSEEN" => attrs.unseen = Some(value as u32),
            "HIGHESTMODSEQ" => attrs.highest_modseq = Some(value),
            _ => {}
          }
        }
        (m, attrs)
      }
    rule search_modseq() -> u64 = "(" "MODSEQ" SP() m:mod_sequence_value() ")" { m }
    rule mailbox_data_search() -> (Vec<u32>, Option<u64>)
      = "SEARCH" ids:(SP() n:nz_number() { n })* modseq:(SP() m:search_modseq() { m })?
      { (ids, modseq) }

    rule message_data_expunge() -> u32 = n:nz_number() SP() "EXPUNGE" { n }
    rule message_data_fetch() -> (u32, Vec<FetchAttr>)
      = n:nz_number() SP() "FETCH" SP() a:msg_att() { (n, a) }

    rule expunged_resp() -> (bool, Vec<Range>)
      = "VANISHED" earlier:(SP() "(EARLIER)" { true })? SP() us:known_uids()
      { (earlier.unwrap_or(false), us) }

    rule enable_data() -> Vec<String> = "ENABLED" cs:((SP() c:capability() { c })*) { cs }

    rule response_data() -> Untagged
      = c:capability_data() { Untagged::Capability(c) }
      / e:enable_data() { Untagged::Enabled(e) }
      / l:mailbox_data_list() { Untagged::List(l) }
      / l:mailbox_data_lsub() { Untagged::Lsub(l) }
      / s:mailbox_data_status() { Untagged::Status { mailbox: s.0, attrs: s.1 } }
      / s:mailbox_data_search() { Untagged::Search { ids: s.0, modseq: s.1 } }
      / f:mailbox_data_flags() { Untagged::Flags(f) }
      / v:expunged_resp() { Untagged::Vanished { earlier: v.0, uids: v.1 } }
      / f:message_data_fetch() { Untagged::Fetch { seqno: f.0, attrs: f.1 } }
      / n:message_data_expunge() { Untagged::Expunge(n) }
      / n:nz_number() SP() "EXISTS" { Untagged::Exists(n) }
      / n:nz_number() SP() "RECENT" { Untagged::Recent(n) }
      / t:status_ok() { Untagged::Ok { code: t.0, text: t.1 } }
      / t:status_no() { Untagged::No { code: t.0, text: t.1 } }
      / t:status_bad() { Untagged::Bad { code: t.0, text: t.1 } }
      / "BYE" SP() t:resp_text() { Untagged::Bye { code: t.0, text: t.1 } }

    pub rule response() -> Response
      = "+" SP()? t:maybe_text() CRLF() { Response::Continuation(t) }
      / "*" SP() d:response_data() CRLF() { Response::Untagged(d) }
  }
}

/// Untagged/continuation responses go through [`grammar::response`] directly; tagged completions
/// are parsed separately below because peg's ordered choice can't report back which of
/// OK/NO/BAD matched without re-parsing, so [`resp_cond_state`] takes the expected keyword as a
/// parameter instead.
pub fn parse(line: &[u8]) -> Result<Response> {
  match grammar::response(line) {
    Ok(response) => Ok(response),
    Err(_) => parse_tagged_line(line),
  }
}

fn parse_tagged_line(line: &[u8]) -> Result<Response> {
  peg::parser! {
    grammar tag_only() for [u8] {
      rule CR() = "\r"
      rule LF() = "\n"
      rule CRLF() = CR() LF()
      rule SP() = " "
      rule CHAR() -> u8 = [b'\x01'..=b'\x7f']
      rule TEXT_CHAR() -> u8 = !(CR() / LF()) c:CHAR() { c }
      rule CTL() = [b'\x00'..=b'\x1f'] / "\x7f"
      rule quoted_specials() = "\"" / "\\"
      rule resp_specials() = "]"
      rule list_wildcards() = "%" / "*"
      rule atom_specials() = "(" / ")" / "{" / SP() / CTL() / list_wildcards() / quoted_specials() / resp_specials()
      rule ASTRING_CHAR() = !atom_specials() CHAR()
      rule tag() -> String = t:$((!"+" ASTRING_CHAR())+) { String::from_utf8_lossy(t).into_owned() }
      rule status() -> super::Status
        = "OK" { super::Status::Ok } / "NO" { super::Status::No } / "BAD" { super::Status::Bad }
      rule text() -> String = t:$(TEXT_CHAR()*) { String::from_utf8_lossy(t).into_owned() }
      pub rule line() -> (String, super::Status, String)
        = tag:tag() SP() status:status() SP() text:text() CRLF()
        { (tag, status, text) }
    }
  }
  match tag_only::line(line) {
    Ok((tag, status, rest)) => {
      let (code, text) = split_response_code(&rest);
      Ok(Response::Tagged { tag, status, code, text })
    }
    Err(_) => Err(Error::parse(line, "unrecognized response")),
  }
}

fn split_response_code(rest: &str) -> (Option<ResponseCode>, String) {
  if let Some(stripped) = rest.strip_prefix('[') {
    if let Some(end) = stripped.find(']') {
      let code_text = &stripped[..end];
      let text = stripped[end + 1..].trim_start().to_string();
      if let Ok(code) = grammar::response_code(code_text.as_bytes()) {
        return (Some(code), text);
      }
      return (
        Some(ResponseCode::Other(code_text.to_string(), None)),
        text,
      );
    }
  }
  (None, rest.to_string())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn tagged_ok_with_code() {
    let response = parse(b"A1 OK [READ-WRITE] Select completed.\r\n").unwrap();
    match response {
      Response::Tagged { tag, status, code, text } => {
        assert_eq!(tag, "A1");
        assert_eq!(status, Status::Ok);
        assert_eq!(code, Some(ResponseCode::ReadWrite));
        assert_eq!(text, "Select completed.");
      }
      other => panic!("unexpected {other:?}"),
    }
  }

  #[test]
  fn tagged_no_without_code() {
    let response = parse(b"A2 NO mailbox doesn't exist\r\n").unwrap();
    match response {
      Response::Tagged { status, code, text, .. } => {
        assert_eq!(status, Status::No);
        assert_eq!(code, None);
        assert_eq!(text, "mailbox doesn't exist");
      }
      other => panic!("unexpected {other:?}"),
    }
  }

  #[test]
  fn continuation() {
    let response = parse(b"+ go ahead\r\n").unwrap();
    assert_eq!(response, Response::Continuation("go ahead".to_string()));
  }

  #[test]
  fn exists_count_overflowing_u32_is_a_parse_error_not_a_panic() {
    let error = parse(b"* 99999999999999999999 EXISTS\r\n").unwrap_err();
    assert!(matches!(error, Error::Parse { .. }));
  }

  #[test]
  fn exists_and_recent() {
    assert_eq!(parse(b"* 23 EXISTS\r\n").unwrap(), Response::Untagged(Untagged::Exists(23)));
    assert_eq!(parse(b"* 3 RECENT\r\n").unwrap(), Response::Untagged(Untagged::Recent(3)));
  }

  #[test]
  fn capability() {
    let response = parse(b"* CAPABILITY IMAP4rev1 IDLE AUTH=PLAIN\r\n").unwrap();
    assert_eq!(
      response,
      Response::Untagged(Untagged::Capability(vec![
        "IMAP4rev1".to_string(),
        "IDLE".to_string(),
        "AUTH=PLAIN".to_string()
      ]))
    );
  }

  #[test]
  fn list_with_literal_mailbox_name() {
    let response =
      parse(b"* LIST (\\HasNoChildren) \"/\" {7}\r\nliteral\r\n").unwrap();
    match response {
      Response::Untagged(Untagged::List(listing)) => {
        assert_eq!(listing.attribs, vec!["\\HasNoChildren".to_string()]);
        assert_eq!(listing.delimiter, Some('/'));
        assert_eq!(listing.name, "literal");
      }
      other => panic!("unexpected {other:?}"),
    }
  }

  #[test]
  fn status_response() {
    let response =
      parse(b"* STATUS INBOX (MESSAGES 231 UIDNEXT 44292 UNSEEN 5)\r\n").unwrap();
    match response {
      Response::Untagged(Untagged::Status { mailbox, attrs }) => {
        assert_eq!(mailbox, "INBOX");
        assert_eq!(attrs.messages, Some(231));
        assert_eq!(attrs.uidnext, Some(44292));
        assert_eq!(attrs.unseen, Some(5));
      }
      other => panic!("unexpected {other:?}"),
    }
  }

  #[test]
  fn search_with_modseq() {
    let response = parse(b"* SEARCH 2 5 6 (MODSEQ 917162500)\r\n").unwrap();
    assert_eq!(
      response,
      Response::Untagged(Untagged::Search { ids: vec![2, 5, 6], modseq: Some(917162500) })
    );
  }

  #[test]
  fn fetch_flags_and_uid() {
    let response = parse(b"* 1 FETCH (UID 10 FLAGS (\\Seen \\Answered) MODSEQ (100))\r\n").unwrap();
    match response {
      Response::Untagged(Untagged::Fetch { seqno, attrs }) => {
        assert_eq!(seqno, 1);
        assert!(attrs.contains(&FetchAttr::Uid(10)));
        assert!(attrs.contains(&FetchAttr::ModSeq(100)));
      }
      other => panic!("unexpected {other:?}"),
    }
  }

  #[test]
  fn envelope_round_trip_shape() {
    let raw = br#"("Wed, 17 Jul 1996 02:23:25 -0700" "subject" (("sender" NIL "sender" "host.com")) (("sender" NIL "sender" "host.com")) NIL (("recipient" NIL "recipient" "host.com")) NIL NIL NIL "<id@host.com>")"#;
    let envelope = grammar::envelope(raw).unwrap();
    assert_eq!(envelope.subject.as_deref(), Some("subject"));
    assert_eq!(envelope.from.len(), 1);
    assert_eq!(envelope.from[0].mailbox.as_deref(), Some("sender"));
    assert_eq!(envelope.message_id.as_deref(), Some("<id@host.com>"));
  }

  #[test]
  fn bodystructure_basic_text() {
    let raw = br#"("TEXT" "PLAIN" ("CHARSET" "US-ASCII") NIL NIL "7BIT" 1152 23)"#;
    let body = grammar::body(raw).unwrap();
    match body {
      BodyStructure::Basic(basic) => {
        assert_eq!(basic.media_type, "TEXT");
        assert_eq!(basic.media_subtype, "PLAIN");
        assert_eq!(basic.size, 1152);
        assert_eq!(basic.lines, Some(23));
      }
      other => panic!("unexpected {other:?}"),
    }
  }

  #[test]
  fn bodystructure_multipart() {
    let raw = br#"(("TEXT" "PLAIN" ("CHARSET" "US-ASCII") NIL NIL "7BIT" 1152 23)("TEXT" "HTML" ("CHARSET" "US-ASCII") NIL NIL "7BIT" 1152 23) "MIXED")"#;
    let body = grammar::body(raw).unwrap();
    match body {
      BodyStructure::Multipart(multipart) => {
        assert_eq!(multipart.media_subtype, "MIXED");
        assert_eq!(multipart.parts.len(), 2);
      }
      other => panic!("unexpected {other:?}"),
    }
  }

  #[test]
  fn vanished_earlier() {
    let response = parse(b"* VANISHED (EARLIER) 300:310,405\r\n").unwrap();
    assert_eq!(
      response,
      Response::Untagged(Untagged::Vanished {
        earlier: true,
        uids: vec![Range(300, 310), Range(405, 405)]
      })
    );
  }

  #[test]
  fn bye() {
    let response = parse(b"* BYE Autologout; idle for too long\r\n").unwrap();
    match response {
      Response::Untagged(Untagged::Bye { text, .. }) => {
        assert_eq!(text, "Autologout; idle for too long");
      }
      other => panic!("unexpected {other:?}"),
    }
  }

  #[test]
  fn appenduid_code() {
    let response = parse(b"A1 OK [APPENDUID 1677851195 1] Append completed.\r\n").unwrap();
    match response {
      Response::Tagged { code: Some(ResponseCode::AppendUid(a)), .. } => {
        assert_eq!(a.uidvalidity, 1677851195);
        assert_eq!(a.uid, 1);
      }
      other => panic!("unexpected {other:?}"),
    }
  }
}
