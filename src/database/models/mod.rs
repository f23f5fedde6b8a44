pub mod achievement;
pub mod identity;
pub mod notification;
pub mod reference;

pub use achievement::{
    Achievement, AchievementDetails, AchievementDraft, AchievementPatch, AchievementType,
    AchievementUpdate, Attachment, CompetitionLevel, KeyCount, NewAchievement, Period,
    PublicationType, StudentPoints,
};
pub use identity::{Lecturer, Student};
pub use notification::{NewNotification, Notification, NotificationType};
pub use reference::{
    AchievementReference, AchievementStatus, PeriodBucket, ReferenceFilter, ReferenceStats,
    SortField, SortOrder,
};
