use encoding_rs::GB18030;

/// 腾讯/新浪行情接口返回 GBK 编码，统一按 GB18030 解码
pub fn gb18030_to_utf8(bytes: &[u8]) -> String {
    let (cow, _, had_errors) = GB18030.decode(bytes);
    if had_errors {
        log::debug!("GB18030 解码存在无法识别的字节，已替换");
    }
    cow.into_owned()
}
