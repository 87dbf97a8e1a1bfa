//! 方法拦截集成测试 crate（测试在 tests/ 目录下）
