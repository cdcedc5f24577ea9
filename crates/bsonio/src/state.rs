//! 读写器状态机定义

/// 读取器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReaderState {
    /// 尚未读取任何内容
    Initial,
    /// 下一步读取元素类型
    Type,
    /// 下一步读取元素名称
    Name,
    /// 下一步读取元素值
    Value,
    /// 下一步读取 JavaScriptWithScope 的作用域文档
    ScopeDocument,
    /// 当前文档的元素已读完
    EndOfDocument,
    /// 当前数组的元素已读完
    EndOfArray,
    /// 顶层值已读完
    Done,
    /// 已关闭
    Closed,
}

/// 写入器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriterState {
    /// 尚未写入任何内容
    Initial,
    /// 下一步写入元素名称(或结束文档)
    Name,
    /// 下一步写入元素值
    Value,
    /// 下一步写入 JavaScriptWithScope 的作用域文档
    ScopeDocument,
    /// 顶层值已写完
    Done,
    /// 已关闭
    Closed,
}

/// 容器帧的类型;顶层用空帧栈表示
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextType {
    TopLevel,
    Document,
    Array,
    JavaScriptWithScope,
    ScopeDocument,
}

impl ContextType {
    /// 元素带名称的容器
    pub fn has_names(self) -> bool {
        matches!(self, ContextType::Document | ContextType::ScopeDocument)
    }
}
