#[unsafe(no_mangle)]
/// ### English
/// Returns the C ABI version.
///
/// ### 中文
/// 返回 C ABI 版本号。
pub extern "C" fn xian_sync_test_abi_version() -> u32 {
    super::XIAN_SYNC_TEST_ABI_VERSION
}
