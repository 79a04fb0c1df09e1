#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOrderResult {
    /// The order is new and was stored with the given id
    Inserted(i64),
    /// The same user has uploaded this order before
    AlreadyUploadedByUser(i64),
    /// The order number belongs to a different user
    UploadedByAnotherUser,
}
